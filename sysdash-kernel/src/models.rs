use serde::{Deserialize, Serialize};

/// Body of `POST /rpc/register_node`.
///
/// `host` may be omitted, the master then uses the address the call came
/// from. `port` is kept wide so out-of-range values can be reported instead
/// of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterNodeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<i64>,
}

/// Answer to a successful registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub last_registered: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_optional_fields() {
        let req: RegisterNodeRequest = serde_json::from_str(r#"{"port": 5001}"#).unwrap();
        assert_eq!(req, RegisterNodeRequest { name: None, host: None, port: Some(5001) });

        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("name").is_none());
        assert!(json.get("host").is_none());
    }
}
