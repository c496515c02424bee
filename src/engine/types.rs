use serde::{Deserialize, Serialize};

/// The role a [`SessionDescription`] plays in an offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// A proposed or agreed media-transport configuration, JSEP shaped
/// (`{"type": "offer", "sdp": "v=0..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    #[serde(default)]
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// A description with no SDP body carries nothing to negotiate.
    pub fn is_empty(&self) -> bool {
        self.sdp.trim().is_empty()
    }
}

/// One connectivity candidate in `RTCIceCandidateInit` form.
///
/// An empty `candidate` string signals end-of-candidates; whether that is
/// meaningful is up to the media engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            ..Self::default()
        }
    }

    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.is_empty()
    }
}

/// Events the media engine raises for one participant outside of any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine changed its local configuration and produced a new offer.
    RenegotiationNeeded(SessionDescription),
    /// The engine gathered a new local candidate.
    LocalCandidate(IceCandidate),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_json_shape() {
        let desc: SessionDescription =
            serde_json::from_str(r#"{"type":"offer","sdp":"v=0\r\n"}"#).unwrap();
        assert_eq!(desc.kind, SdpType::Offer);
        assert!(!desc.is_empty());

        let value = serde_json::to_value(SessionDescription::answer("v=0")).unwrap();
        assert_eq!(value["type"], "answer");
        assert_eq!(value["sdp"], "v=0");
    }

    #[test]
    fn test_missing_sdp_is_empty() {
        let desc: SessionDescription = serde_json::from_str(r#"{"type":"offer"}"#).unwrap();
        assert!(desc.is_empty());
    }

    #[test]
    fn test_candidate_uses_browser_field_names() {
        let candidate: IceCandidate = serde_json::from_str(
            r#"{"candidate":"candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host","sdpMid":"0","sdpMLineIndex":0}"#,
        )
        .unwrap();
        assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
        assert_eq!(candidate.sdp_mline_index, Some(0));
        assert!(!candidate.is_end_of_candidates());

        let value = serde_json::to_value(IceCandidate::new("")).unwrap();
        assert_eq!(value, serde_json::json!({ "candidate": "" }));
    }
}
