//! Request/response pairing for CDP network events.
//!
//! Chrome reports a request, its response headers and the end of its body as
//! separate events sharing one request id. A redirect reuses the id: the next
//! `requestWillBeSent` carries the 3xx response of the previous hop.

use crate::driver::DriverEvent;
use netlog_core::{RequestInfo, ResponseInfo};
use std::collections::HashMap;

/// Separator between a request id and its redirect hop number
const REDIRECT_HOP: &str = "#redirect-";

/// Request id for the `hop`-th redirect response of `request_id`
pub(crate) fn redirect_hop_id(request_id: &str, hop: u32) -> String {
    format!("{}{}{}", request_id, REDIRECT_HOP, hop)
}

/// Redirect responses have no body of their own to fetch
pub(crate) fn is_redirect_hop(request_id: &str) -> bool {
    request_id.contains(REDIRECT_HOP)
}

struct InFlight {
    request: RequestInfo,
    response: Option<ResponseInfo>,
    redirects: u32,
}

/// Tracks requests until their body has finished loading
#[derive(Default)]
pub(crate) struct Correlator {
    in_flight: HashMap<String, InFlight>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A request was sent; returns the previous hop's response first when this is a redirect
    pub(crate) fn on_request(
        &mut self,
        request_id: &str,
        request: RequestInfo,
        redirect_response: Option<ResponseInfo>,
    ) -> Vec<DriverEvent> {
        let mut events = Vec::with_capacity(2);
        let mut redirects = 0;

        if let Some(response) = redirect_response {
            match self.in_flight.remove(request_id) {
                Some(previous) => {
                    redirects = previous.redirects + 1;
                    events.push(DriverEvent::Response {
                        request_id: redirect_hop_id(request_id, redirects),
                        request: previous.request,
                        response,
                    });
                }
                None => tracing::trace!("Redirect for untracked request {}", request_id),
            }
        }

        self.in_flight.insert(
            request_id.to_string(),
            InFlight {
                request: request.clone(),
                response: None,
                redirects,
            },
        );
        events.push(DriverEvent::Request {
            request_id: request_id.to_string(),
            request,
        });
        events
    }

    /// Response headers arrived; held until the body is done
    pub(crate) fn on_response(&mut self, request_id: &str, response: ResponseInfo) {
        if let Some(entry) = self.in_flight.get_mut(request_id) {
            entry.response = Some(response);
        }
    }

    pub(crate) fn on_finished(&mut self, request_id: &str) -> Option<DriverEvent> {
        self.take_answered(request_id)
    }

    /// Loading failed; only requests that already got headers produce a response
    pub(crate) fn on_failed(&mut self, request_id: &str, error_text: &str) -> Option<DriverEvent> {
        let event = self.take_answered(request_id);
        if event.is_none() {
            tracing::debug!("Request {} abandoned: {}", request_id, error_text);
        }
        event
    }

    pub(crate) fn pending(&self) -> usize {
        self.in_flight.len()
    }

    fn take_answered(&mut self, request_id: &str) -> Option<DriverEvent> {
        let InFlight { request, response, .. } = self.in_flight.remove(request_id)?;
        Some(DriverEvent::Response {
            request_id: request_id.to_string(),
            request,
            response: response?,
        })
    }
}
