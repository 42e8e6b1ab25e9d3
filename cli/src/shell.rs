use std::collections::VecDeque;

use anyhow::Context;
use crux_core::Core;
use imagegen_shared::api::ApiConfig;
use imagegen_shared::{App, Capabilities, Effect, Event, ViewModel};
use tracing::{debug, info};

use crate::http;

/// Native shell around the headless core. Effects are executed one at a
/// time, in the order the core emits them, until the core goes quiet.
pub struct Shell {
    core: Core<Effect, App>,
    client: reqwest::Client,
}

impl Shell {
    pub fn new(api_base_url: &str) -> anyhow::Result<Self> {
        let config = ApiConfig::new(api_base_url)
            .with_context(|| format!("invalid API base URL '{api_base_url}'"))?;

        let shell = Self {
            core: Core::new::<Capabilities>(),
            client: http::build_client()?,
        };
        // Configure only issues a render, so there is nothing to drive.
        let _ = shell.core.process_event(Event::Configure {
            api_base_url: config.base_url().to_string(),
        });
        info!(base_url = config.base_url(), "shell ready");

        Ok(shell)
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn dispatch(&self, event: Event) {
        debug!(event = event.name(), "dispatching");
        let mut queue: VecDeque<Effect> = self.core.process_event(event).into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Render(_) => {}
                Effect::Http(mut request) => {
                    let response = http::execute(&self.client, &request.operation).await;
                    queue.extend(self.core.resolve(&mut request, response));
                }
            }
        }
    }

    pub fn view(&self) -> ViewModel {
        self.core.view()
    }
}
