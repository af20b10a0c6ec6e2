use clap::Parser;
use shopfeed::{
    Config, CreatedAt, FeedScope, FeedSession, HttpBackend, HttpChangeFeed, Post, Viewer,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
struct Args {
    /// Follow a single profile's posts instead of the global feed.
    #[arg(long)]
    profile: Option<String>,

    /// Posts per page.
    #[arg(long, default_value_t = 25)]
    page_size: usize,
}

fn print_post(post: &Post) {
    let when = match post.created_at {
        CreatedAt::Pending => "pending".to_string(),
        CreatedAt::At(at) => at.to_rfc3339(),
    };
    println!(
        "[{}] {} ({} likes, {} comments)\n    {}",
        when, post.author_display_name, post.like_count, post.comment_count, post.body
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = Config::load_env_config();

    let scope = match args.profile {
        Some(author) => FeedScope::Profile(author),
        None => FeedScope::Global,
    };
    let viewer = Viewer {
        id: config.viewer_id,
        display_name: config.viewer_name,
        avatar_ref: None,
    };
    let session = FeedSession::new(
        Arc::new(HttpBackend::new(&config.api_url)),
        Arc::new(HttpChangeFeed::new(&config.api_url)),
        viewer,
        scope,
        args.page_size,
    );

    session.load_next_page().await?;
    let mut seen = HashSet::new();
    for post in session.posts().await {
        print_post(&post);
        seen.insert(post.id.clone());
    }

    println!("-- following live changes, ctrl-c to quit --");
    loop {
        tokio::time::sleep(Duration::from_secs(2)).await;
        for post in session.posts().await {
            if seen.insert(post.id.clone()) {
                print_post(&post);
            }
        }
    }
}
