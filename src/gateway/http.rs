use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use vicecity_api::config::NetworkConfig;

use crate::error::ApiResult;
use crate::gateway::{GatewayEvent, Request};

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    user_agent: String,
    events: UnboundedSender<GatewayEvent>,
}

impl HttpDispatcher {
    pub fn new(config: &NetworkConfig, events: UnboundedSender<GatewayEvent>) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            events,
        })
    }

    /// Issue `req` on its own task. Replies are emitted as gateway events,
    /// failures are only logged.
    pub fn dispatch(&self, req: Request) {
        let this = self.clone();
        tokio::spawn(async move {
            let url = req.url.clone();
            match this.execute(req).await {
                Ok(events) => {
                    for ev in events {
                        let _ = this.events.send(ev);
                    }
                }
                Err(err) => log::debug!("Request to {url} failed: {err}"),
            }
        });
    }

    pub async fn execute(&self, req: Request) -> ApiResult<Vec<GatewayEvent>> {
        let mut builder = self
            .client
            .request(req.method.clone(), req.url.clone())
            .header(USER_AGENT, &self.user_agent);

        if let Some(content_type) = content_type_header(&req) {
            builder = builder.header(CONTENT_TYPE, content_type);
        }

        if let Some(auth) = &req.authorization {
            builder = builder.header(AUTHORIZATION, auth);
        }

        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .is_some_and(|ct| ct.starts_with(JSON_CONTENT_TYPE));
        let body = resp.bytes().await?;

        let mut events = vec![];
        if is_json {
            let json = serde_json::from_slice(&body).unwrap_or_else(|err| {
                log::debug!("Malformed JSON reply from {}: {err}", req.url);
                Value::Null
            });
            events.push(GatewayEvent::Reply {
                status,
                sender: req.sender,
                body,
            });
            events.push(GatewayEvent::JsonReply {
                status,
                sender: req.sender,
                body: json,
            });
        } else {
            events.push(GatewayEvent::Reply {
                status,
                sender: req.sender,
                body,
            });
        }

        Ok(events)
    }
}

/// Content type is only sent alongside a body that has an explicit type.
fn content_type_header(req: &Request) -> Option<&str> {
    req.body.as_ref().and(req.content_type.as_deref())
}
