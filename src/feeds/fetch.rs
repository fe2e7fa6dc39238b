use bytes::Bytes;
use reqwest::Client;

use super::reader::FeedError;

pub async fn fetch_rss(client: &Client, url: &str) -> Result<Bytes, FeedError> {
    let resp = client.get(url).send().await.map_err(FeedError::from_reqwest)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::Status(status));
    }
    resp.bytes().await.map_err(FeedError::from_reqwest)
}
