//! Task-local correlation id propagation
//!
//! Every event and log record produced while a run is executing must carry
//! that run's `correlation_id` (equal to its `run_id`, see GLOSSARY). Rather
//! than threading the id through every function signature, it is carried as
//! a [`tokio::task_local!`] value: whichever task calls
//! [`with_correlation_id`] has the id available to [`current_correlation_id`]
//! for the duration of the future, and any task it `tokio::spawn`s that is
//! itself wrapped in `with_correlation_id` (or uses [`instrument_with`])
//! inherits it.
//!
//! This is the `tracing`-native way to carry an implicit context value: a
//! `tracing` span field survives exactly as long as the task-local does, and
//! every
//! `tracing::info!`/`warn!`/`error!` call made while the span is entered
//! picks up the field automatically.

use std::future::Future;

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Run `fut` with `correlation_id` set as the ambient task-local value and
/// entered as a `tracing` span field, so every log record emitted inside
/// `fut` (directly or via further `.await`s on the same task) carries it.
pub async fn with_correlation_id<F, T>(correlation_id: impl Into<String>, fut: F) -> T
where
    F: Future<Output = T>,
{
    let id = correlation_id.into();
    let span = tracing::info_span!("run", correlation_id = %id);
    CORRELATION_ID
        .scope(id, tracing::Instrument::instrument(fut, span))
        .await
}

/// Read the correlation id of the enclosing [`with_correlation_id`] scope.
///
/// Returns `None` outside of any scope (e.g. process startup, background
/// maintenance tasks not tied to a run).
pub fn current_correlation_id() -> Option<String> {
    CORRELATION_ID.try_with(|id| id.clone()).ok()
}

/// Mint a fresh run id of the shape `exec_{graph_id}_{random_suffix}`
/// described in §4.C8.
pub fn new_run_id(graph_id: &str) -> String {
    let suffix: String = {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| {
                let c = rng.gen_range(0..36);
                std::char::from_digit(c, 36).unwrap()
            })
            .collect()
    };
    format!("exec_{graph_id}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn propagates_within_scope() {
        assert_eq!(current_correlation_id(), None);
        with_correlation_id("exec_g_abc", async {
            assert_eq!(current_correlation_id().as_deref(), Some("exec_g_abc"));
        })
        .await;
        assert_eq!(current_correlation_id(), None);
    }

    #[tokio::test]
    async fn nested_scopes_see_innermost_id() {
        with_correlation_id("outer", async {
            with_correlation_id("inner", async {
                assert_eq!(current_correlation_id().as_deref(), Some("inner"));
            })
            .await;
            assert_eq!(current_correlation_id().as_deref(), Some("outer"));
        })
        .await;
    }

    #[test]
    fn run_id_has_expected_shape() {
        let id = new_run_id("g1");
        assert!(id.starts_with("exec_g1_"));
        assert_eq!(id.len(), "exec_g1_".len() + 8);
    }
}
