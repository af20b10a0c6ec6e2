use std::env;

use dotenv::dotenv;

/// Connection settings for the feed service, loaded from a local `.env`
/// file.
///
/// - `FEED_API_URL`: base URL of the feed's request/response API
/// - `FEED_VIEWER_ID`: the signed-in viewer's author id
/// - `FEED_VIEWER_NAME`: display name rendered into optimistic entries
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub viewer_id: String,
    pub viewer_name: String,
}

impl Config {
    pub fn load_env_config() -> Self {
        dotenv().unwrap();
        Config {
            api_url: env::var("FEED_API_URL").unwrap(),
            viewer_id: env::var("FEED_VIEWER_ID").unwrap(),
            viewer_name: env::var("FEED_VIEWER_NAME").unwrap(),
        }
    }
}
