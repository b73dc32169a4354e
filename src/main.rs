use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};

use ideas_hub::config::Config;
use ideas_hub::models::{IdeaDraft, NewComment, Stage, Visibility};
use ideas_hub::thread::CommentThread;
use ideas_hub::utils::logging;
use ideas_hub::{ApiError, IdeasHub, UploadFile};

#[derive(Parser)]
#[command(name = "ideas-hub", version, about = "Ideas Hub command-line client")]
struct AppCli {
    /// Config file path
    #[arg(short, long, default_value = "ideas-hub.json", global = true)]
    config: PathBuf,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "IDEAS_HUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "IDEAS_HUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in profile
    Me,
    /// Print the Google sign-in URL
    GoogleUrl,
    /// Finish a Google sign-in from the redirect URL
    OauthCallback { url: String },
    /// Confirm an email address from a link token
    VerifyEmail { token: String },
    /// Confirm an email address with a code
    ConfirmEmail {
        #[arg(long)]
        email: String,
        #[arg(long)]
        token: String,
    },
    ResendVerification { email: String },
    VerificationStatus,
    ForgotPassword { email: String },
    ResendResetEmail { email: String },
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Browse and manage ideas
    #[command(subcommand)]
    Ideas(IdeaCommands),
    /// Read and write comments
    #[command(subcommand)]
    Comments(CommentCommands),
    /// Toggle your vote on an idea, or show the tally
    Vote {
        idea_id: String,
        #[arg(long)]
        show: bool,
    },
    /// Toggle your like on an idea, or show the count
    React {
        idea_id: String,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand)]
enum IdeaCommands {
    List,
    Show { id: String },
    Create(IdeaFields),
    Edit {
        id: String,
        #[command(flatten)]
        fields: IdeaFields,
    },
    Delete { id: String },
}

#[derive(Args)]
struct IdeaFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    summary: Option<String>,
    /// Markdown body
    #[arg(long)]
    body: Option<String>,
    /// Comma separated tags
    #[arg(long)]
    tags: Option<String>,
    #[arg(long, value_enum)]
    visibility: Option<VisibilityArg>,
    #[arg(long, value_enum)]
    stage: Option<StageArg>,
    /// Image file to upload and attach; repeatable
    #[arg(long = "image")]
    images: Vec<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum VisibilityArg {
    Public,
    Private,
}

impl From<VisibilityArg> for Visibility {
    fn from(arg: VisibilityArg) -> Self {
        match arg {
            VisibilityArg::Public => Visibility::Public,
            VisibilityArg::Private => Visibility::Private,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Seed,
    Prototype,
    Growth,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Seed => Stage::Seed,
            StageArg::Prototype => Stage::Prototype,
            StageArg::Growth => Stage::Growth,
        }
    }
}

#[derive(Subcommand)]
enum CommentCommands {
    /// Top-level comments of an idea
    List { idea_id: String },
    /// Replies to a comment
    Replies { comment_id: String },
    Add {
        idea_id: String,
        body: String,
        /// Reply to this comment
        #[arg(long)]
        parent: Option<String>,
    },
    /// Remove a comment (admin)
    Delete { comment_id: String },
    /// Print the comment tree of an idea
    Thread {
        idea_id: String,
        /// Reply levels to load
        #[arg(long, default_value_t = 2)]
        depth: usize,
    },
}

impl IdeaFields {
    fn apply(&self, draft: &mut IdeaDraft) {
        if let Some(title) = &self.title {
            draft.title = title.clone();
        }
        if let Some(summary) = &self.summary {
            draft.short_summary = summary.clone();
        }
        if let Some(body) = &self.body {
            draft.body_md = body.clone();
        }
        if let Some(tags) = &self.tags {
            draft.tags = IdeaDraft::parse_tags(tags);
        }
        if let Some(visibility) = self.visibility {
            draft.visibility = visibility.into();
        }
        if let Some(stage) = self.stage {
            draft.stage = stage.into();
        }
    }

    async fn files(&self) -> Result<Vec<UploadFile>> {
        let mut files = Vec::with_capacity(self.images.len());
        for path in &self.images {
            let file = UploadFile::from_path(path)
                .await
                .with_context(|| format!("reading image {}", path.display()))?;
            files.push(file);
        }
        Ok(files)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(hub: &IdeasHub, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let user = hub.login(&email, &password).await?;
            info!(user_id = %user.id, "signed in");
            print_json(&user)?;
        }
        Commands::Signup {
            name,
            email,
            password,
        } => print_json(&hub.signup(&name, &email, &password).await?)?,
        Commands::Logout => {
            hub.logout().await?;
            println!("signed out");
        }
        Commands::Me => print_json(&hub.me().await?)?,
        Commands::GoogleUrl => println!("{}", hub.google_login_url()),
        Commands::OauthCallback { url } => print_json(&hub.complete_oauth_callback(&url).await?)?,
        Commands::VerifyEmail { token } => print_json(&hub.verify_email(&token).await?)?,
        Commands::ConfirmEmail { email, token } => {
            print_json(&hub.confirm_email(&email, &token).await?)?
        }
        Commands::ResendVerification { email } => {
            print_json(&hub.resend_verification(&email).await?)?
        }
        Commands::VerificationStatus => print_json(&hub.verification_status().await?)?,
        Commands::ForgotPassword { email } => print_json(&hub.forgot_password(&email).await?)?,
        Commands::ResendResetEmail { email } => {
            print_json(&hub.resend_reset_email(&email).await?)?
        }
        Commands::ResetPassword {
            token,
            password,
            confirm,
        } => print_json(&hub.reset_password(&token, &password, &confirm).await?)?,
        Commands::Ideas(cmd) => run_ideas(hub, cmd).await?,
        Commands::Comments(cmd) => run_comments(hub, cmd).await?,
        Commands::Vote { idea_id, show } => {
            let summary = if show {
                hub.vote_summary(&idea_id).await?
            } else {
                hub.toggle_vote(&idea_id).await?
            };
            print_json(&summary)?;
        }
        Commands::React { idea_id, show } => {
            let summary = if show {
                hub.reactions(&idea_id).await?
            } else {
                hub.toggle_reaction(&idea_id).await?
            };
            print_json(&summary)?;
        }
    }
    Ok(())
}

async fn run_ideas(hub: &IdeasHub, cmd: IdeaCommands) -> Result<()> {
    match cmd {
        IdeaCommands::List => print_json(&hub.list_ideas().await?)?,
        IdeaCommands::Show { id } => print_json(&hub.get_idea(&id).await?)?,
        IdeaCommands::Create(fields) => {
            let mut draft = IdeaDraft::default();
            fields.apply(&mut draft);
            let files = fields.files().await?;
            print_json(&hub.submit_idea(None, &draft, files).await?)?;
        }
        IdeaCommands::Edit { id, fields } => {
            let current = hub.get_idea(&id).await?;
            let mut draft = IdeaDraft::from(&current);
            fields.apply(&mut draft);
            let files = fields.files().await?;
            print_json(&hub.submit_idea(Some(&id), &draft, files).await?)?;
        }
        IdeaCommands::Delete { id } => {
            hub.delete_idea(&id).await?;
            println!("deleted {id}");
        }
    }
    Ok(())
}

async fn run_comments(hub: &IdeasHub, cmd: CommentCommands) -> Result<()> {
    match cmd {
        CommentCommands::List { idea_id } => print_json(&hub.list_comments(&idea_id).await?)?,
        CommentCommands::Replies { comment_id } => {
            print_json(&hub.list_replies(&comment_id).await?)?
        }
        CommentCommands::Add {
            idea_id,
            body,
            parent,
        } => {
            let comment = match parent {
                Some(parent) => NewComment::reply(idea_id, parent, body),
                None => NewComment::top_level(idea_id, body),
            };
            print_json(&hub.add_comment(&comment).await?)?;
        }
        CommentCommands::Delete { comment_id } => {
            hub.delete_comment(&comment_id).await?;
            println!("deleted {comment_id}");
        }
        CommentCommands::Thread { idea_id, depth } => {
            let mut thread = CommentThread::load(hub, &idea_id).await?;
            let fetched = thread.expand_all(hub, depth).await?;
            debug!(fetched, comments = thread.len(), "thread expanded");
            if thread.is_empty() {
                println!("No comments yet.");
            } else {
                print!("{}", thread.render());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppCli::parse();
    logging::init(args.verbose);

    let config = Config::load(&args.config)?;
    let hub = IdeasHub::from_config(&config)
        .await
        .context("opening session")?;
    hub.session().check_auth().await;

    let result = run(&hub, args.command).await;
    if let Err(err) = &result {
        let expired = err
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_unauthorized);
        if expired && !hub.session().check_auth().await {
            eprintln!("Session ended; sign in again with `ideas-hub login`.");
        }
    }
    result
}
