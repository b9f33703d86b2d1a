/*
[INPUT]:  Parsed configuration, context file path and a shutdown token
[OUTPUT]: Created, resumed, listed or logged-out bunq contexts
[POS]:    Command layer - one function per CLI subcommand
[UPDATE]: When adding subcommands or changing what they persist
*/

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result, bail};
use bunq_core::{
    ClientConfig, MonetaryAccountBank, QueryParam, SessionManager, count, create_context,
    load_context, older_than, read_context, save_context,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::CliConfig;

/// Run `future` unless shutdown is requested first
async fn until_shutdown<T>(
    shutdown: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => bail!("interrupted"),
        result = future => result,
    }
}

fn persist(manager: &SessionManager, path: &Path) -> Result<()> {
    let context = manager.export_context().context("export context")?;
    save_context(&context, path).with_context(|| format!("save context {}", path.display()))
}

async fn resume(path: &Path) -> Result<SessionManager> {
    if !path.exists() {
        bail!(
            "no context at {}; run `bunq-cli init` first",
            path.display()
        );
    }
    load_context(path, ClientConfig::default())
        .await
        .with_context(|| format!("resume context {}", path.display()))
}

/// Create a fresh identity, run the handshake and persist the context
pub async fn run_init(
    config: &CliConfig,
    context_path: &Path,
    shutdown: &CancellationToken,
) -> Result<()> {
    if context_path.exists() {
        bail!(
            "context already exists at {}; run `bunq-cli logout` and remove it first",
            context_path.display()
        );
    }

    info!(api_url = config.api_url(), "creating new context");
    let manager = until_shutdown(shutdown, async {
        create_context(
            config.api_url(),
            &config.api_key,
            &config.device_description,
            config.permitted_ips.clone(),
            ClientConfig::default(),
        )
        .await
        .context("create context")
    })
    .await?;

    persist(&manager, context_path)?;
    println!("Context written to: {}", context_path.display());
    print_session(&manager);
    Ok(())
}

/// Resume the saved context, renewing the session if it was dropped or `renew` is set
pub async fn run_session(
    context_path: &Path,
    renew: bool,
    shutdown: &CancellationToken,
) -> Result<()> {
    let manager = until_shutdown(shutdown, resume(context_path)).await?;
    if renew {
        until_shutdown(shutdown, renew_session(&manager)).await?;
    }
    persist(&manager, context_path)?;
    print_session(&manager);
    Ok(())
}

async fn renew_session(manager: &SessionManager) -> Result<()> {
    manager.create_session().await.context("renew session")?;
    info!("session renewed");
    Ok(())
}

/// List bank accounts of the session user
pub async fn run_accounts(
    context_path: &Path,
    page_size: Option<u32>,
    before_id: Option<u64>,
    shutdown: &CancellationToken,
) -> Result<()> {
    let manager = until_shutdown(shutdown, resume(context_path)).await?;
    persist(&manager, context_path)?;

    let params = account_params(page_size, before_id);
    let page = until_shutdown(shutdown, async {
        let client = manager.client();
        match client.list_monetary_accounts_bank(params.clone()).await {
            // The server expired the saved session; renew once and replay
            Err(err) if err.is_session_rejected() => {
                warn!(error = %err, "session rejected by server");
                renew_session(&manager).await?;
                persist(&manager, context_path)?;
                client
                    .list_monetary_accounts_bank(params)
                    .await
                    .context("list monetary accounts")
            }
            result => result.context("list monetary accounts"),
        }
    })
    .await?;

    for account in &page.items {
        println!("{}", format_account(account));
    }
    if page.pagination.has_previous() {
        if let Some(last) = page.items.last() {
            println!("more accounts available: --older-than {}", last.id);
        }
    }
    Ok(())
}

/// End the remote session and drop it from the saved context
pub async fn run_logout(context_path: &Path, shutdown: &CancellationToken) -> Result<()> {
    let mut context = read_context(context_path)
        .with_context(|| format!("read context {}", context_path.display()))?;
    if context.session_token.is_none() {
        println!("No active session");
        return Ok(());
    }

    let manager =
        SessionManager::from_context(&context, ClientConfig::default()).context("restore context")?;
    let deleted = until_shutdown(shutdown, async { Ok(manager.delete_session().await) }).await?;
    match deleted {
        Ok(()) => {}
        Err(err) if err.is_session_gone() => {
            warn!(error = %err, "session already ended on the server");
        }
        Err(err) => return Err(err).context("delete session"),
    }

    context.clear_session();
    save_context(&context, context_path)
        .with_context(|| format!("save context {}", context_path.display()))?;
    println!("Session ended; installation kept in {}", context_path.display());
    Ok(())
}

pub fn account_params(page_size: Option<u32>, before_id: Option<u64>) -> Vec<QueryParam> {
    let mut params = Vec::new();
    if let Some(n) = page_size {
        params.push(count(n));
    }
    if let Some(id) = before_id {
        params.push(older_than(id));
    }
    params
}

pub fn format_account(account: &MonetaryAccountBank) -> String {
    let balance = account
        .balance
        .as_ref()
        .map(|amount| format!("{} {}", amount.value, amount.currency))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>10}  {:<8}  {:>14}  {}",
        account.id,
        account.status.as_deref().unwrap_or("-"),
        balance,
        account.description.as_deref().unwrap_or("")
    )
}

fn print_session(manager: &SessionManager) {
    if let Some(session) = manager.client().sessions().session() {
        println!(
            "User {} ({:?}, business: {}), session {} since {}",
            session.user_id,
            session.user_kind,
            session.is_business(),
            session.id,
            session.created_at
        );
    }
}
