use anyhow::bail;
use clap::Parser;
use shopfeed::{
    Config, FeedStore, HttpBackend, MediaKind, MediaRef, MutationCoordinator, PostDraft,
    StoreGeneration, Viewer,
};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Parser, Debug)]
struct Args {
    /// Text of the post. May be empty when media is attached.
    #[arg(long, default_value = "")]
    body: String,

    /// Opaque media URI to attach.
    #[arg(long)]
    media_uri: Option<String>,

    /// Kind of the attached media: image or video.
    #[arg(long)]
    media_kind: Option<String>,

    /// Product reference to tag on the post.
    #[arg(long)]
    tagged_item: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = Config::load_env_config();

    let media = match (args.media_uri, args.media_kind.as_deref()) {
        (None, _) => None,
        (Some(uri), Some("image")) => Some(MediaRef {
            uri,
            kind: MediaKind::Image,
        }),
        (Some(uri), Some("video")) => Some(MediaRef {
            uri,
            kind: MediaKind::Video,
        }),
        (Some(_), other) => bail!("--media-kind must be image or video, got {other:?}"),
    };
    if args.body.is_empty() && media.is_none() {
        bail!("a post needs a body or media");
    }

    let store = Arc::new(Mutex::new(FeedStore::new()));
    let coordinator = MutationCoordinator::new(
        store,
        Arc::new(HttpBackend::new(&config.api_url)),
        Viewer {
            id: config.viewer_id,
            display_name: config.viewer_name,
            avatar_ref: None,
        },
        StoreGeneration::new(),
    );

    println!("Publishing post...");
    let id = coordinator
        .create_post(PostDraft {
            body: args.body,
            media,
            tagged_item_ref: args.tagged_item,
        })
        .await?;
    println!("Confirmed as {id:?}");
    Ok(())
}
