//! Priority 12: HTTP/2-specific anomaly signals. Only eligible when the
//! request was actually negotiated over HTTP/2 — the transport layer is
//! expected to have stamped `request.protocol` before the pipeline runs.

use crate::contributors::blackboard::RequestBlackboard;
use crate::contributors::framework::{Contributor, TriggerCondition};
use crate::core::model::DetectionContribution;
use crate::core::signals;
use crate::request::ProtocolVersion;

fn is_http2(board: &RequestBlackboard) -> bool {
    board.request.protocol == ProtocolVersion::Http2
}

const TRIGGERS: &[TriggerCondition] = &[is_http2 as TriggerCondition];

/// Real browsers send a consistent set of `sec-fetch-*` request headers over
/// HTTP/2; their absence alongside an otherwise browser-claiming UA is the
/// cheapest HTTP/2-layer tell available without raw frame access.
const BROWSER_TELL_HEADERS: &[&str] = &["sec-fetch-site", "sec-fetch-mode", "sec-fetch-dest"];

pub struct Http2Fingerprint;

impl Contributor for Http2Fingerprint {
    fn name(&self) -> &'static str {
        "Http2Fingerprint"
    }

    fn priority(&self) -> i32 {
        12
    }

    fn trigger_conditions(&self) -> &[TriggerCondition] {
        TRIGGERS
    }

    fn run(&self, board: &RequestBlackboard) -> Vec<DetectionContribution> {
        let headers = &board.request.headers;
        let behind_proxy = headers.contains("via") || headers.get("x-forwarded-for").is_some();
        let uses_priority = headers.contains("priority");
        let push_enabled = headers.contains("x-http2-push");
        let missing_browser_tells = BROWSER_TELL_HEADERS.iter().all(|h| !headers.contains(h));
        let claims_browser_ua = board
            .request
            .user_agent()
            .is_some_and(|ua| ua.contains("Mozilla") || ua.contains("Chrome") || ua.contains("Safari"));

        let mut contribution = DetectionContribution::neutral(self.name(), "HTTP/2 fingerprint unremarkable")
            .with_signal(signals::H2_IS_HTTP2, true)
            .with_signal(signals::H2_BEHIND_PROXY, behind_proxy)
            .with_signal(signals::H2_USES_PRIORITY, uses_priority)
            .with_signal(signals::H2_PUSH_ENABLED, push_enabled)
            .with_signal(signals::H2_PREFACE_VALID, true);

        if claims_browser_ua && missing_browser_tells {
            contribution.confidence_delta = 0.3;
            contribution.reason = "browser-claiming UA missing expected Sec-Fetch-* headers over HTTP/2".to_string();
            contribution = contribution.with_signal(signals::H2_FINGERPRINT_UNKNOWN, true);
        } else {
            contribution = contribution.with_signal(signals::H2_FINGERPRINT_UNKNOWN, false);
        }

        vec![contribution]
    }
}
