use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{
    Action, ActionKind, Amount, DebitError, IntegrityReport, Lending, Lendings, Member, UserId,
    apply_credit, apply_debit, balance_of, build_integrity_report, recent_actions,
};
use crate::storage::{self, Backend, Snapshot, Store};

use super::{LedgerError, MemberDirectory, Outbox};

/// Tunables of the ledger service.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Plural name of the tracked resource, used in every message
    pub resource_name: String,
    /// Number of actions a status report shows when the caller gives none
    pub status_length: usize,
    /// Upper bound for a single store load or save
    pub persistence_timeout: Duration,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            resource_name: "Excavators".to_string(),
            status_length: 5,
            persistence_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of a status query. `lines` are exactly the messages queued.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// The subject's lending (at most one) or every current lending
    pub balances: Vec<Lending>,
    /// Newest first
    pub actions: Vec<Action>,
    pub lines: Vec<String>,
}

struct LedgerState {
    snapshot: Snapshot,
    outbox: Outbox,
}

/// Application service owning the lendings, the action log and the outbox.
///
/// Every operation holds one lock across its whole read-modify-write,
/// including the store save, so concurrent commands can't lose updates.
/// The in-memory state only changes after the store accepted the new snapshot.
pub struct LedgerService {
    store: Box<dyn Store>,
    settings: LedgerSettings,
    state: Mutex<LedgerState>,
}

impl LedgerService {
    /// Load the ledger from `store`.
    pub async fn open(
        store: Box<dyn Store>,
        settings: LedgerSettings,
    ) -> Result<Self, LedgerError> {
        let snapshot = bounded(settings.persistence_timeout, store.load()).await?;
        debug!(
            store = %store.describe(),
            lendings = snapshot.lendings.len(),
            actions = snapshot.actions.len(),
            "Ledger loaded"
        );

        Ok(Self {
            store,
            settings,
            state: Mutex::new(LedgerState {
                snapshot,
                outbox: Outbox::new(),
            }),
        })
    }

    /// Open the store at `path` (backend inferred when `None`) and load it.
    pub async fn connect(
        path: &Path,
        backend: Option<Backend>,
        settings: LedgerSettings,
    ) -> Result<Self, LedgerError> {
        let store = storage::open(path, backend).await?;
        Self::open(store, settings).await
    }

    /// Like [`connect`](Self::connect), then write the store back so the
    /// file exists afterwards.
    pub async fn init(
        path: &Path,
        backend: Option<Backend>,
        settings: LedgerSettings,
    ) -> Result<Self, LedgerError> {
        let service = Self::connect(path, backend, settings).await?;
        {
            let state = service.state.lock().await;
            service.persist(&state.snapshot).await?;
        }
        Ok(service)
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    pub fn store_description(&self) -> String {
        self.store.describe()
    }

    // ========================
    // Commands
    // ========================

    /// Hand `amount` resources to `subject`. Returns the subject's new total.
    pub async fn credit(
        &self,
        issuer: &Member,
        subject: &Member,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        let mut state = self.state.lock().await;
        if let Err(err) = validate(subject, amount) {
            state.outbox.push(validation_message(subject, amount));
            return Err(err);
        }

        let resource = &self.settings.resource_name;
        let mut next = state.snapshot.clone();
        let total = match apply_credit(&mut next.lendings, subject, amount) {
            Ok(total) => total,
            Err(err) => {
                state.outbox.push(format!(
                    "{} can't hold **{}** more {}. Ignored!",
                    subject.name, amount, resource
                ));
                return Err(LedgerError::Validation(format!("{}: {}", subject.name, err)));
            }
        };
        let sequence = next.next_sequence();
        next.actions.push(
            Action::new(issuer.id, subject.id, ActionKind::Credit, amount, Utc::now())
                .with_sequence(sequence),
        );

        self.persist(&next).await?;
        state.snapshot = next;

        info!(
            issuer = issuer.id,
            subject = subject.id,
            amount,
            total,
            "{} handed {} {} to {}",
            issuer.name,
            amount,
            resource,
            subject.name
        );
        state.outbox.push(format!(
            "Given {} **{}** {}. {} now has **{}** in total",
            subject.name, amount, resource, subject.name, total
        ));
        Ok(total)
    }

    /// Take `amount` resources back from `subject`. Returns the remaining
    /// total, 0 once the lending is settled.
    ///
    /// A subject without a lending is rejected before anything is written.
    pub async fn debit(
        &self,
        issuer: &Member,
        subject: &Member,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        let mut state = self.state.lock().await;
        if let Err(err) = validate(subject, amount) {
            state.outbox.push(validation_message(subject, amount));
            return Err(err);
        }

        let resource = &self.settings.resource_name;
        let mut next = state.snapshot.clone();
        let total = match apply_debit(&mut next.lendings, subject.id, amount) {
            Ok(total) => total,
            Err(DebitError::NeverBorrowed) => {
                state.outbox.push(format!(
                    "User {} never borrowed any {}. Ignored!",
                    subject.name, resource
                ));
                return Err(LedgerError::NotFound(subject.name.clone()));
            }
        };
        let sequence = next.next_sequence();
        next.actions.push(
            Action::new(issuer.id, subject.id, ActionKind::Debit, amount, Utc::now())
                .with_sequence(sequence),
        );

        self.persist(&next).await?;
        state.snapshot = next;

        info!(
            issuer = issuer.id,
            subject = subject.id,
            amount,
            total,
            "{} took back {} {} from {}",
            issuer.name,
            amount,
            resource,
            subject.name
        );
        state.outbox.push(format!(
            "{} returned **{}** {}. {} now has **{}**",
            subject.name, amount, resource, subject.name, total
        ));
        Ok(total)
    }

    /// Report the subject's balance and recent actions, or every balance and
    /// the recent actions of everyone when `subject` is `None`.
    /// `count` falls back to the configured status length.
    pub async fn status(
        &self,
        subject: Option<&Member>,
        count: Option<usize>,
        directory: &dyn MemberDirectory,
    ) -> Result<StatusReport, LedgerError> {
        let limit = count.unwrap_or(self.settings.status_length);
        let resource = &self.settings.resource_name;
        let mut state = self.state.lock().await;

        if let Some(subject) = subject.filter(|s| !s.is_valid()) {
            state.outbox.push("No/Invalid user mentioned");
            return Err(LedgerError::Resolution(subject.id.to_string()));
        }

        let snapshot = &state.snapshot;
        let names = NameResolver {
            directory,
            subject,
            lendings: &snapshot.lendings,
        };
        let mut report = StatusReport::default();

        match subject {
            Some(subject) => {
                match snapshot.lendings.get(&subject.id) {
                    Some(lending) => {
                        report.lines.push(format!(
                            "**{}** currently has **{}** {}",
                            subject.name, lending.borrowed, resource
                        ));
                        report.balances.push(lending.clone());
                    }
                    None => report
                        .lines
                        .push(format!("**{}** has no {}", subject.name, resource)),
                }

                let actions = recent_actions(&snapshot.actions, Some(subject.id), limit);
                if actions.is_empty() {
                    report.lines.push(format!(
                        "There are no actions regarding user {}",
                        subject.name
                    ));
                }
                report.actions = actions.into_iter().cloned().collect();
            }
            None => {
                let mut lendings: Vec<&Lending> = snapshot.lendings.values().collect();
                lendings.sort_by_cached_key(|l| {
                    (names.resolve(l.subject_id).to_lowercase(), l.subject_id)
                });
                for lending in lendings {
                    report.lines.push(format!(
                        "**{}** currently has **{}** {}",
                        names.resolve(lending.subject_id),
                        lending.borrowed,
                        resource
                    ));
                    report.balances.push(lending.clone());
                }
                report.actions = recent_actions(&snapshot.actions, None, limit)
                    .into_iter()
                    .cloned()
                    .collect();
            }
        }

        for action in &report.actions {
            report.lines.push(format!(
                "{} actioned '{}' of {} {} to {} on {}",
                names.resolve(action.issuer_id),
                action.kind,
                action.amount,
                resource,
                names.resolve(action.subject_id),
                action.when_display()
            ));
        }

        state.outbox.extend(report.lines.iter().cloned());
        Ok(report)
    }

    /// Take all queued user-facing messages, in order.
    pub async fn drain_messages(&self) -> Vec<String> {
        self.state.lock().await.outbox.drain()
    }

    /// Queue a message that didn't come from a ledger operation, e.g. a
    /// resolution failure noticed by the caller.
    pub async fn queue_message(&self, message: impl Into<String>) {
        self.state.lock().await.outbox.push(message);
    }

    // ========================
    // Queries
    // ========================

    /// Outstanding amount for a subject, 0 when none.
    pub async fn balance(&self, subject_id: UserId) -> Amount {
        balance_of(&self.state.lock().await.snapshot.lendings, subject_id)
    }

    pub async fn lendings(&self) -> Lendings {
        self.state.lock().await.snapshot.lendings.clone()
    }

    /// The full action log in insertion order.
    pub async fn actions(&self) -> Vec<Action> {
        self.state.lock().await.snapshot.actions.clone()
    }

    /// Check stored lendings against the action log.
    pub async fn check_integrity(&self) -> IntegrityReport {
        let state = self.state.lock().await;
        build_integrity_report(&state.snapshot.lendings, &state.snapshot.actions)
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), LedgerError> {
        bounded(self.settings.persistence_timeout, self.store.save(snapshot)).await
    }
}

fn validate(subject: &Member, amount: Amount) -> Result<(), LedgerError> {
    if !subject.is_valid() || amount <= 0 {
        return Err(LedgerError::Validation(format!(
            "no valid user ({}) or amount ({}) given",
            subject.name, amount
        )));
    }
    Ok(())
}

fn validation_message(subject: &Member, amount: Amount) -> String {
    format!(
        "No \"client\" ({}) or \"amount\" ({}) given!",
        subject.name, amount
    )
}

/// Run a store operation under the configured time limit.
async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, LedgerError> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(LedgerError::Timeout(limit)),
    }
}

/// Display names for action lines: the directory first, then the status
/// subject, then the name stored on a lending.
struct NameResolver<'a> {
    directory: &'a dyn MemberDirectory,
    subject: Option<&'a Member>,
    lendings: &'a Lendings,
}

impl NameResolver<'_> {
    fn resolve(&self, id: UserId) -> String {
        self.directory
            .name_of(id)
            .or_else(|| self.subject.filter(|s| s.id == id).map(|s| s.name.clone()))
            .or_else(|| self.lendings.get(&id).map(|l| l.subject_name.clone()))
            .unwrap_or_else(|| {
                warn!(user = id, "Member could not be resolved");
                format!("unknown user ({})", id)
            })
    }
}
