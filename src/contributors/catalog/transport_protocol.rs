//! Priority 13: transport-layer protocol upgrades and non-browser wire
//! formats — WebSocket, gRPC, GraphQL introspection/batching, Server-Sent
//! Events. None of these are bot signals on their own; they seed signals
//! later contributors (and the policy layer) can weight per path.

use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::Contributor;
use crate::core::model::DetectionContribution;
use crate::core::signals;

pub struct TransportProtocol;

impl Contributor for TransportProtocol {
    fn name(&self) -> &'static str {
        "TransportProtocol"
    }

    fn priority(&self) -> i32 {
        13
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let headers = &board.request.headers;
        let content_type = headers.get("content-type").unwrap_or_default();
        let accept = headers.get("accept").unwrap_or_default();

        let is_upgrade = headers
            .get("upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
        let ws_origin = headers.get("origin").map(str::to_string);
        let ws_version = headers.get("sec-websocket-version").map(str::to_string);
        let is_grpc = content_type.starts_with("application/grpc");
        let is_graphql_path = board.request.path_without_query().ends_with("/graphql");
        let graphql_introspection = is_graphql_path && content_type.contains("json");
        let graphql_batch = is_graphql_path && headers.get("x-apollo-batch").is_some();
        let is_sse = accept.contains("text/event-stream");

        let mut contribution = DetectionContribution::neutral(self.name(), "no notable transport upgrade")
            .with_signal(signals::TRANSPORT_IS_UPGRADE, is_upgrade)
            .with_signal(signals::TRANSPORT_GRPC_CONTENT_TYPE, is_grpc)
            .with_signal(signals::TRANSPORT_GRAPHQL_INTROSPECTION, graphql_introspection)
            .with_signal(signals::TRANSPORT_GRAPHQL_BATCH, graphql_batch)
            .with_signal(signals::TRANSPORT_SSE, is_sse);

        if let Some(origin) = ws_origin {
            contribution = contribution.with_signal(signals::TRANSPORT_WS_ORIGIN, origin);
        }
        if let Some(version) = ws_version {
            contribution = contribution.with_signal(signals::TRANSPORT_WS_VERSION, version);
        }

        if graphql_batch {
            contribution.confidence_delta = 0.15;
            contribution.reason = "batched GraphQL request, common scraping pattern".to_string();
        } else if graphql_introspection {
            contribution.reason = "GraphQL introspection-capable request".to_string();
        }

        vec![contribution]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HttpRequestContext, ProtocolVersion};

    fn board_with(path: &str, headers: &[(&str, &str)]) -> RequestBlackboard {
        let mut ctx = HttpRequestContext::new("r1", "POST", path, ProtocolVersion::Http1_1);
        for (k, v) in headers {
            ctx.headers.insert(*k, *v);
        }
        RequestBlackboard::new(ctx)
    }

    #[test]
    fn websocket_upgrade_is_detected() {
        let board = board_with("/ws", &[("Upgrade", "websocket"), ("Origin", "https://example.com")]);
        let contributions = TransportProtocol.run(&board);
        assert_eq!(
            contributions[0].signals.get(signals::TRANSPORT_IS_UPGRADE).map(|v| v.as_truthy()),
            Some(true)
        );
    }

    #[test]
    fn batched_graphql_request_scores_above_zero() {
        let board = board_with("/graphql", &[("Content-Type", "application/json"), ("X-Apollo-Batch", "true")]);
        let contributions = TransportProtocol.run(&board);
        assert!(contributions[0].confidence_delta > 0.0);
    }

    #[test]
    fn plain_request_is_neutral() {
        let board = board_with("/api/users", &[]);
        let contributions = TransportProtocol.run(&board);
        assert!((contributions[0].confidence_delta).abs() < f64::EPSILON);
    }
}
