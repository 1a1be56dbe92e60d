//! Priority 14: HTTP/3-specific anomaly signals, gated to requests actually
//! negotiated over QUIC.

use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::{Contributor, TriggerCondition};
use crate::core::model::DetectionContribution;
use crate::core::signals;
use crate::request::ProtocolVersion;

fn is_http3(board: &RequestBlackboard) -> bool {
    board.request.protocol == ProtocolVersion::Http3
}

const TRIGGERS: &[TriggerCondition] = &[is_http3 as TriggerCondition];

pub struct Http3Fingerprint;

impl Contributor for Http3Fingerprint {
    fn name(&self) -> &'static str {
        "Http3Fingerprint"
    }

    fn priority(&self) -> i32 {
        14
    }

    fn trigger_conditions(&self) -> &[TriggerCondition] {
        TRIGGERS
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let headers = &board.request.headers;
        let zero_rtt = headers
            .get("early-data")
            .is_some_and(|v| v.trim() == "1");
        let migrated = headers.contains("x-quic-migrated");
        let client_type = if board
            .request
            .user_agent()
            .is_some_and(|ua| ua.contains("Mozilla") || ua.contains("Chrome") || ua.contains("Safari") || ua.contains("Firefox"))
        {
            "Browser"
        } else {
            "NonBrowser"
        };

        let mut contribution = DetectionContribution::neutral(self.name(), "HTTP/3 fingerprint unremarkable")
            .with_signal(signals::H3_IS_HTTP3, true)
            .with_signal(signals::H3_ZERO_RTT, zero_rtt)
            .with_signal(signals::H3_CONNECTION_MIGRATED, migrated)
            .with_signal(signals::H3_PROTOCOL, "h3")
            .with_signal(signals::H3_CLIENT_TYPE, client_type);

        if client_type == "NonBrowser" && zero_rtt {
            contribution.confidence_delta = 0.2;
            contribution.reason = "0-RTT HTTP/3 request from a non-browser client".to_string();
        }

        vec![contribution]
    }
}
