//! Blocking JSON client for a robot-side bridge service that fronts the vendor SDK.
//!
//! The bridge owns the lease and e-stop keep-alive; this side only forwards
//! commands and maps HTTP failures onto [`GatewayError`].

use crate::{GatewayError, Result, RobotGateway, VelocityCommand};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone, Serialize)]
pub struct BridgeCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BridgeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

pub struct HttpBridgeGateway {
    base_url: String,
    credentials: BridgeCredentials,
    client: Client,
}

#[derive(Serialize)]
struct TimeoutReq {
    timeout_s: f64,
}

#[derive(Serialize)]
struct VelocityReq {
    v_x: f64,
    v_y: f64,
    v_rot: f64,
    end_time_secs: f64,
}

#[derive(Deserialize)]
struct PowerResp {
    powered_on: bool,
}

impl HttpBridgeGateway {
    /// `address` may be a bare host (`192.168.80.3`) or a full base URL.
    pub fn new(
        address: &str,
        credentials: BridgeCredentials,
        request_timeout: Duration,
    ) -> Result<Self> {
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{address}:8080")
        };
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            base_url,
            credentials,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "bridge request");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| map_reqwest(path, e))?;
        check_status(path, resp)
    }

    fn post_empty(&self, path: &str) -> Result<()> {
        self.post(path, &serde_json::json!({})).map(|_| ())
    }
}

fn map_reqwest(path: &str, err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(format!("{path}: {err}"))
    } else {
        GatewayError::Transport(format!("{path}: {err}"))
    }
}

fn check_status(path: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = resp.text().unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Auth(format!("{path}: HTTP {status} {detail}"))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            GatewayError::Timeout(format!("{path}: HTTP {status}"))
        }
        _ => GatewayError::Rejected(format!("{path}: HTTP {status} {detail}")),
    })
}

fn unix_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

impl RobotGateway for HttpBridgeGateway {
    fn authenticate(&self) -> Result<()> {
        self.post("/auth", &self.credentials).map(|_| ())
    }

    fn is_powered_on(&self) -> Result<bool> {
        let path = "/power";
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .map_err(|e| map_reqwest(path, e))?;
        let body: PowerResp = check_status(path, resp)?
            .json()
            .map_err(|e| GatewayError::Transport(format!("{path}: bad body: {e}")))?;
        Ok(body.powered_on)
    }

    fn power_on(&self, timeout: Duration) -> Result<()> {
        self.post(
            "/power/on",
            &TimeoutReq {
                timeout_s: timeout.as_secs_f64(),
            },
        )
        .map(|_| ())
    }

    fn power_off(&self) -> Result<()> {
        self.post_empty("/power/off")
    }

    fn self_right(&self) -> Result<()> {
        self.post_empty("/self-right")
    }

    fn stand(&self, timeout: Duration) -> Result<()> {
        self.post(
            "/stand",
            &TimeoutReq {
                timeout_s: timeout.as_secs_f64(),
            },
        )
        .map(|_| ())
    }

    fn set_velocity(&self, command: VelocityCommand, end_time: SystemTime) -> Result<()> {
        self.post(
            "/velocity",
            &VelocityReq {
                v_x: command.v_x,
                v_y: command.v_y,
                v_rot: command.v_rot,
                end_time_secs: unix_secs(end_time),
            },
        )
        .map(|_| ())
    }

    fn stop(&self) -> Result<()> {
        self.post_empty("/stop")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn creds() -> BridgeCredentials {
        BridgeCredentials {
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn bare_host_gets_default_port() {
        let gw = HttpBridgeGateway::new("192.168.80.3", creds(), Duration::from_secs(1)).unwrap();
        assert_eq!(gw.base_url(), "http://192.168.80.3:8080");
    }

    #[test]
    fn full_url_is_kept() {
        let gw =
            HttpBridgeGateway::new("http://robot.local:9000/", creds(), Duration::from_secs(1))
                .unwrap();
        assert_eq!(gw.base_url(), "http://robot.local:9000");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let shown = format!("{:?}", creds());
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn unreachable_bridge_is_a_transport_error() {
        let gw = HttpBridgeGateway::new("http://127.0.0.1:9", creds(), Duration::from_millis(500))
            .unwrap();
        let err = gw.stop().unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Transport(_) | GatewayError::Timeout(_)
        ));
    }

    /// Answer each incoming request with the next canned `(status, body)`.
    fn serve(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                read_request(&mut stream);
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });
        format!("http://{addr}")
    }

    fn read_request(stream: &mut std::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length || n == 0 {
                    return;
                }
            } else if n == 0 {
                return;
            }
        }
    }

    #[test]
    fn http_statuses_map_onto_gateway_errors() {
        let url = serve(vec![
            (401, r#"{"error":"bad credentials"}"#),
            (403, ""),
            (408, ""),
            (504, ""),
            (500, r#"{"error":"estop engaged"}"#),
            (409, ""),
        ]);
        let gw = HttpBridgeGateway::new(&url, creds(), Duration::from_secs(5)).unwrap();

        let err = gw.authenticate().unwrap_err();
        assert!(matches!(err, GatewayError::Auth(ref m) if m.contains("bad credentials")));
        assert!(matches!(gw.stop(), Err(GatewayError::Auth(_))));
        assert!(matches!(gw.stand(Duration::from_secs(1)), Err(GatewayError::Timeout(_))));
        assert!(matches!(
            gw.power_on(Duration::from_secs(1)),
            Err(GatewayError::Timeout(_))
        ));
        let err = gw.self_right().unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(ref m) if m.contains("estop engaged")));
        assert!(matches!(gw.power_off(), Err(GatewayError::Rejected(_))));
    }

    #[test]
    fn power_state_is_read_from_the_bridge() {
        let url = serve(vec![(200, r#"{"powered_on":true}"#), (200, "{}")]);
        let gw = HttpBridgeGateway::new(&url, creds(), Duration::from_secs(5)).unwrap();
        assert!(gw.is_powered_on().unwrap());
        gw.set_velocity(
            VelocityCommand::new(0.5, 0.0, 0.0),
            SystemTime::now() + Duration::from_secs(1),
        )
        .unwrap();
    }
}
