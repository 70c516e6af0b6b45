use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use color_eyre::Result;
use std::sync::Arc;

mod adapters;
mod application;
mod domain;
mod ports;

use adapters::{
    api::{ApiClient, HttpCommentRepository},
    cache::MokaCacheAdapter,
    config::{FileConfigStore, TOKEN_ENV_VAR},
    prompt::{AssumeYes, StdinConfirmer},
    tui::{run_tui, App},
};
use application::{AppError, CommentService, CommentThread};
use domain::{Article, ArticleId, CommentId, Viewer};
use ports::{AppConfig, ConfigStore, Confirmer};

fn cli() -> Command {
    Command::new("agora")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Read and discuss articles from the terminal")
        .long_about("A keyboard-driven client for article comment threads.\n\nWith --article and no subcommand, the thread opens in the TUI.\nSubcommands print JSON for scripting.")
        .arg(
            Arg::new("token")
                .long("token")
                .value_name("TOKEN")
                .help(format!("API token (can also be set via {TOKEN_ENV_VAR} env var)"))
                .global(true),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .value_name("URL")
                .help("Base URL of the API, e.g. http://localhost:8000/api/")
                .global(true),
        )
        .arg(
            Arg::new("viewer")
                .long("viewer")
                .value_name("USER_ID")
                .value_parser(value_parser!(u64))
                .help("Your user ID; enables liking and own-comment actions")
                .global(true),
        )
        .arg(
            Arg::new("staff")
                .long("staff")
                .action(ArgAction::SetTrue)
                .help("Act as a staff member (may delete any comment)")
                .global(true),
        )
        .arg(
            Arg::new("article")
                .long("article")
                .short('a')
                .value_name("ARTICLE_ID")
                .value_parser(value_parser!(u64))
                .help("Article whose comments to work with")
                .global(true),
        )
        .subcommand(
            Command::new("comments")
                .about("Comment operations")
                .subcommand_required(true)
                .subcommand(Command::new("list").about("List the comment thread as nested JSON"))
                .subcommand(
                    Command::new("post")
                        .about("Post a comment or a reply")
                        .arg(
                            Arg::new("text")
                                .long("text")
                                .short('t')
                                .value_name("TEXT")
                                .help("Comment text")
                                .required(true),
                        )
                        .arg(
                            Arg::new("parent")
                                .long("parent")
                                .value_name("COMMENT_ID")
                                .value_parser(value_parser!(u64))
                                .help("Reply to this comment"),
                        ),
                )
                .subcommand(
                    Command::new("like")
                        .about("Toggle your like on a top-level comment")
                        .arg(comment_id_arg()),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete one of your comments")
                        .arg(comment_id_arg())
                        .arg(
                            Arg::new("yes")
                                .long("yes")
                                .short('y')
                                .action(ArgAction::SetTrue)
                                .help("Do not ask for confirmation"),
                        ),
                ),
        )
        .subcommand(
            Command::new("article")
                .about("Article operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("show")
                        .about("Show an article as JSON")
                        .arg(
                            Arg::new("article_id")
                                .help("Article ID to fetch")
                                .value_parser(value_parser!(u64))
                                .required(true)
                                .index(1),
                        ),
                ),
        )
        .subcommand(Command::new("tui").about("Open the comment thread of --article"))
}

fn comment_id_arg() -> Arg {
    Arg::new("comment_id")
        .help("Comment ID")
        .value_parser(value_parser!(u64))
        .required(true)
        .index(1)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Logs go to a file so they never tear the TUI
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("agora-cli.log")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let matches = cli().get_matches();

    // Load configuration; command line flags override it for this run only
    let config_store = FileConfigStore::new()?;
    let mut config = config_store.load_config().await?;
    apply_overrides(&mut config, &matches);

    // An explicit --token is remembered for later runs
    if let Some(token) = matches.get_one::<String>("token") {
        config_store.set_api_token(token).await?;
    }

    if config.api_token.is_none() {
        tracing::info!("No API token configured, requests are anonymous");
    }

    // Create dependencies
    let api_client = ApiClient::new(&config.api_base_url, config.api_token.clone())?;
    let repo = Arc::new(HttpCommentRepository::new(api_client));
    let article_cache: Arc<MokaCacheAdapter<ArticleId, Article>> =
        Arc::new(MokaCacheAdapter::new(config.cache_ttl_seconds, 1000));
    let service = Arc::new(CommentService::new(repo.clone(), repo, article_cache));

    let article = matches.get_one::<u64>("article").copied().map(ArticleId);
    let thread = Arc::new(CommentThread::new(service.clone(), article, config.viewer));

    match matches.subcommand() {
        Some(("comments", comments_matches)) => {
            if article.is_none() {
                exit_with("--article is required for comment operations");
            }
            run_comments(comments_matches, &thread).await?;
        }
        Some(("article", article_matches)) => {
            if let Some(("show", show_matches)) = article_matches.subcommand() {
                if let Some(&id) = show_matches.get_one::<u64>("article_id") {
                    match service.get_article(ArticleId(id), true).await {
                        Ok(article) => print_json(&article)?,
                        Err(e) => exit_with(e.user_message("Failed to load article")),
                    }
                }
            }
        }
        Some(("tui", _)) => {
            if article.is_none() {
                exit_with("--article is required to open a thread");
            }
            launch_tui(thread, service).await;
        }
        None if article.is_some() => launch_tui(thread, service).await,
        None => cli().print_help()?,
        _ => exit_with("Unknown command"),
    }

    Ok(())
}

fn apply_overrides(config: &mut AppConfig, matches: &ArgMatches) {
    if let Some(token) = matches.get_one::<String>("token") {
        config.api_token = Some(token.clone());
    }
    if let Some(url) = matches.get_one::<String>("api-url") {
        config.api_base_url = url.clone();
    }
    let staff = matches.get_flag("staff");
    if let Some(&id) = matches.get_one::<u64>("viewer") {
        config.viewer = Some(Viewer::new(id, staff));
    } else if staff {
        if let Some(viewer) = config.viewer.as_mut() {
            viewer.is_staff = true;
        }
    }
}

async fn run_comments(matches: &ArgMatches, thread: &CommentThread) -> Result<()> {
    match matches.subcommand() {
        Some(("list", _)) => {
            if let Err(e) = thread.refresh().await {
                fail(thread, e, "Failed to load comments").await;
            }
            print_json(&thread.tree().await.to_nested())?;
        }
        Some(("post", post_matches)) => {
            if let Some(text) = post_matches.get_one::<String>("text") {
                thread.set_text(text.as_str()).await;
            }
            if let Some(&parent) = post_matches.get_one::<u64>("parent") {
                thread.start_reply(CommentId(parent)).await;
            }
            match thread.submit().await {
                Ok(comment) => print_json(&comment)?,
                Err(e) => fail(thread, e, "Failed to post comment").await,
            }
        }
        Some(("like", like_matches)) => {
            let id = comment_id(like_matches);
            // like state and root-ness come from the loaded thread
            if let Err(e) = thread.refresh().await {
                fail(thread, e, "Failed to load comments").await;
            }
            let outcome = thread.toggle_like(id).await;
            tracing::debug!("Like on comment {} ended {:?}", id, thread.like_transition(id));
            match outcome {
                Ok(()) => match thread.tree().await.get(id) {
                    Some(comment) => print_json(comment)?,
                    None => exit_with(format!("Comment {id} is no longer available")),
                },
                Err(e) => fail(thread, e, "Failed to update like").await,
            }
        }
        Some(("delete", delete_matches)) => {
            let id = comment_id(delete_matches);
            let confirmer: &dyn Confirmer = if delete_matches.get_flag("yes") {
                &AssumeYes
            } else {
                &StdinConfirmer
            };
            if let Err(e) = thread.refresh().await {
                fail(thread, e, "Failed to load comments").await;
            }
            match thread.delete_comment(id, confirmer).await {
                Ok(true) => print_json(&serde_json::json!({ "deleted": id }))?,
                Ok(false) => eprintln!("Cancelled"),
                Err(e) => fail(thread, e, "Failed to delete comment").await,
            }
        }
        _ => exit_with("Unknown comments subcommand"),
    }
    Ok(())
}

async fn launch_tui(thread: Arc<CommentThread>, service: Arc<CommentService>) {
    let app = App::new(thread, service);
    if let Err(e) = run_tui(app).await {
        match e.downcast_ref::<AppError>() {
            Some(err) => exit_with(err.user_message("Application error")),
            None => exit_with(format!("Application error: {e}")),
        }
    }
}

fn comment_id(matches: &ArgMatches) -> CommentId {
    matches
        .get_one::<u64>("comment_id")
        .copied()
        .map(CommentId)
        .unwrap_or_else(|| exit_with("A comment ID is required"))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report what the thread already told the user, or fall back to the error.
async fn fail(thread: &CommentThread, err: AppError, fallback: &str) {
    tracing::error!("{}: {}", fallback, err);
    let message = thread
        .error()
        .await
        .unwrap_or_else(|| err.user_message(fallback));
    exit_with(message)
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {message}");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overridden(args: &[&str]) -> AppConfig {
        let mut config = AppConfig {
            viewer: Some(Viewer::new(3, false)),
            ..AppConfig::default()
        };
        let matches = cli().try_get_matches_from(args).unwrap();
        apply_overrides(&mut config, &matches);
        config
    }

    #[test]
    fn test_flags_override_loaded_config() {
        let config = overridden(&["agora", "--api-url", "https://site.example/api/", "--viewer", "8"]);
        assert_eq!(config.api_base_url, "https://site.example/api/");
        assert_eq!(config.viewer, Some(Viewer::new(8, false)));

        let config = overridden(&["agora", "comments", "list", "--staff", "--article", "4"]);
        assert_eq!(config.viewer, Some(Viewer::new(3, true)));
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn test_no_flags_leave_config_alone() {
        assert_eq!(
            overridden(&["agora"]),
            AppConfig {
                viewer: Some(Viewer::new(3, false)),
                ..AppConfig::default()
            }
        );
    }
}
