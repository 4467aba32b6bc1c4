use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

/// Fire-and-forget click tracking: `GET /api/click/<id>` on the site origin.
#[derive(Debug, Clone)]
pub struct ClickBeacon {
    client: Client,
    origin: Url,
}

impl ClickBeacon {
    pub fn new(client: Client, origin: Url) -> Self {
        Self { client, origin }
    }

    pub fn beacon_url(&self, id: &str) -> Result<Url, url::ParseError> {
        let mut url = self.origin.join("/api/click/")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    /// Sends the beacon in the background. The response is never inspected;
    /// the handle only exists so callers can wait for delivery.
    pub fn track(&self, id: &str) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = self.beacon_url(id);
        let id = id.to_string();
        tokio::spawn(async move {
            let url = match url {
                Ok(url) => url,
                Err(err) => {
                    debug!(%id, error = %err, "cannot build click beacon url");
                    return;
                }
            };
            match client.get(url).send().await {
                Ok(response) => debug!(%id, status = response.status().as_u16(), "click recorded"),
                Err(err) => debug!(%id, error = %err, "click beacon failed"),
            }
        })
    }
}
