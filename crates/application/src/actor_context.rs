//! Per-request actor identity carried implicitly through async call chains.
//!
//! The context lives in tokio task-local storage. Each `run_as_actor` call
//! installs its context for the dynamic extent of the wrapped future only,
//! so concurrent requests polled on the same worker thread never observe
//! each other's values. Tasks started with [`spawn_with_actor`] inherit the
//! context that was current when they were spawned.

use std::future::Future;

use tokio::task::JoinHandle;

tokio::task_local! {
    static ACTOR_CONTEXT: ActorContext;
}

/// Identity and request metadata of whoever is performing an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    /// Acting user; absent for system and background operations.
    pub user_id: Option<String>,
    /// Origin network address.
    pub ip: Option<String>,
    /// Origin client descriptor.
    pub user_agent: Option<String>,
}

impl ActorContext {
    /// Creates a context with no fields set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            user_id: None,
            ip: None,
            user_agent: None,
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the origin address.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Sets the origin client descriptor.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Runs `operation` with `context` as the current actor.
///
/// The operation's output, including any error it carries, is returned
/// unchanged. The previously active context is visible again once the
/// operation completes.
pub async fn run_as_actor<F>(context: ActorContext, operation: F) -> F::Output
where
    F: Future,
{
    ACTOR_CONTEXT.scope(context, operation).await
}

/// Returns the innermost active actor context, or an empty one.
#[must_use]
pub fn actor_context() -> ActorContext {
    ACTOR_CONTEXT
        .try_with(ActorContext::clone)
        .unwrap_or_default()
}

/// Spawns a task that observes the caller's current actor context.
pub fn spawn_with_actor<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let context = actor_context();
    tokio::spawn(ACTOR_CONTEXT.scope(context, future))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fincontrol_core::AppError;

    use super::{ActorContext, actor_context, run_as_actor, spawn_with_actor};

    #[tokio::test]
    async fn context_is_empty_outside_any_scope() {
        assert_eq!(actor_context(), ActorContext::default());
    }

    #[tokio::test]
    async fn nested_scope_wins_and_outer_is_restored() {
        let outer = ActorContext::empty().with_user_id("outer");
        let inner = ActorContext::empty().with_user_id("inner").with_ip("10.0.0.1");

        let observed = run_as_actor(outer.clone(), async {
            let before = actor_context();
            let nested = run_as_actor(inner.clone(), async { actor_context() }).await;
            let after = actor_context();
            (before, nested, after)
        })
        .await;

        assert_eq!(observed.0, outer);
        assert_eq!(observed.1, inner);
        assert_eq!(observed.2, outer);
        assert_eq!(actor_context(), ActorContext::empty());
    }

    #[tokio::test]
    async fn interleaved_scopes_do_not_leak() {
        async fn observe(user: &'static str) -> Vec<Option<String>> {
            let mut seen = Vec::new();
            for step in 0..5u64 {
                seen.push(actor_context().user_id);
                tokio::time::sleep(Duration::from_millis(step % 3)).await;
                tokio::task::yield_now().await;
            }
            seen.push(actor_context().user_id);
            assert!(seen.iter().all(|value| value.as_deref() == Some(user)));
            seen
        }

        let (left, right) = tokio::join!(
            run_as_actor(ActorContext::empty().with_user_id("ana"), observe("ana")),
            run_as_actor(ActorContext::empty().with_user_id("bia"), observe("bia")),
        );

        assert_eq!(left.len(), 6);
        assert_eq!(right.len(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn spawned_tasks_inherit_the_current_context() {
        let context = ActorContext::empty()
            .with_user_id("user-7")
            .with_user_agent("test-agent");

        let observed = run_as_actor(context.clone(), async {
            let handle = spawn_with_actor(async {
                tokio::task::yield_now().await;
                actor_context()
            });
            handle.await
        })
        .await;

        assert_eq!(observed.ok(), Some(context));
    }

    #[tokio::test]
    async fn operation_errors_propagate_unchanged() {
        let result: Result<(), AppError> = run_as_actor(
            ActorContext::empty().with_user_id("user-1"),
            async { Err(AppError::Conflict("duplicate vendor".to_owned())) },
        )
        .await;

        assert!(matches!(result, Err(AppError::Conflict(message)) if message == "duplicate vendor"));
    }
}
