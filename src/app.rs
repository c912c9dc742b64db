use std::{io, path::Path};

use anyhow::Result;

use crate::{
    backend::{self, BackendSession},
    cli::{Cli, Command},
    domain::{self, conversation_list_state::ConversationListState},
    infra::{
        self, error::AppError, files::FsFileReader, secret_store::FileSecretStore,
        storage_layout::StorageLayout,
    },
    ui::{self, StdinEventSource},
    usecases::{
        self, bootstrap,
        context::AppContext,
        conversation_feed::{ConversationFeed, FeedSettings},
        inbox::InboxSession,
        list_conversations::refresh_conversation_list,
        session::{load_identity, login, logout, LoginOutcome, LoginPolicy, StdTerminal},
    },
};

pub fn run(cli: Cli) -> Result<()> {
    tracing::debug!(
        ui = ui::module_name(),
        domain = domain::module_name(),
        backend = backend::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        "module boundaries loaded"
    );

    match cli.command_or_default() {
        Command::List { watch } => {
            let context = bootstrap::bootstrap(cli.config.as_deref())?;
            run_list(&context, watch)?;
        }
        Command::Open {
            conversation,
            peer,
            name,
        } => {
            let context = bootstrap::bootstrap(cli.config.as_deref())?;
            let label = name.unwrap_or_else(|| peer.clone());
            run_open(&context, conversation, peer, &label)?;
        }
        Command::Login => {
            let context = bootstrap::bootstrap(cli.config.as_deref())?;
            let mut terminal = StdTerminal;
            if let LoginOutcome::Cancelled =
                login(&mut terminal, &context.secrets, &LoginPolicy::default())?
            {
                println!("Nothing was saved.");
            }
        }
        Command::Logout => {
            let secrets = logout_store(cli.config.as_deref())?;
            let outcome = logout(&secrets)?;
            tracing::info!(removed_keys = outcome.removed_keys, "logout completed");
            println!("Logged out. Stored credentials were removed.");
        }
    }

    Ok(())
}

fn run_list(context: &AppContext, watch: bool) -> Result<()> {
    let identity = load_identity(&context.secrets)?;
    let backend = BackendSession::start(&context.config, &identity.access_token)?;
    if watch {
        backend.connect_live();
    }

    let mut state = ConversationListState::default();
    if let Err(error) = refresh_conversation_list(&backend.conversation_source(), &mut state) {
        for line in ui::listing::render_list(&state) {
            eprintln!("{line}");
        }
        return Err(AppError::ConversationsUnavailable { code: error.code() }.into());
    }

    if !watch {
        for line in ui::listing::render_list(&state) {
            println!("{line}");
        }
        return Ok(());
    }

    let mut events = StdinEventSource::spawn()?;
    let channel = backend.live_channel();
    ui::listing::watch(&mut state, channel.as_ref(), &identity.user.id, &mut events)
}

fn run_open(context: &AppContext, conversation_id: String, peer_id: String, label: &str) -> Result<()> {
    let identity = load_identity(&context.secrets)?;
    let backend = BackendSession::start(&context.config, &identity.access_token)?;
    backend.connect_live();

    let feed = ConversationFeed::open(
        FeedSettings {
            conversation_id,
            self_user_id: identity.user.id.clone(),
            peer_id,
            page_size: context.config.feed.page_size,
            reconcile_window_ms: context.config.feed.reconcile_window_ms,
            max_upload_bytes: context.config.feed.max_upload_bytes,
        },
        backend.history_fetcher(),
        backend.live_channel(),
    );
    let mut session = InboxSession::new(feed, FsFileReader);
    let mut events = StdinEventSource::spawn()?;

    ui::inbox::start(&mut session, &mut events, label, &mut io::stdout())
}

/// Logout must work even when the config file is broken.
fn logout_store(config_path: Option<&Path>) -> Result<FileSecretStore, AppError> {
    match bootstrap::bootstrap(config_path) {
        Ok(context) => Ok(context.secrets),
        Err(error) => {
            tracing::warn!(
                error = ?error,
                "logout fallback: bootstrap failed, continuing with local cleanup"
            );
            let layout = StorageLayout::resolve()?;
            layout.ensure_dirs()?;
            Ok(FileSecretStore::from_layout(&layout))
        }
    }
}
