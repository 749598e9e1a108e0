//! Authorization gate consulted before any reorder.

/// Answers "may the current caller write to this board's collection".
///
/// The check itself lives elsewhere; the board only reads the verdict.
pub trait AccessGate: Send + Sync {
    fn can_reorder(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn can_reorder(&self) -> bool {
        true
    }
}

/// Read-only board: every press is a click.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl AccessGate for DenyAll {
    fn can_reorder(&self) -> bool {
        false
    }
}

impl<F> AccessGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn can_reorder(&self) -> bool {
        self()
    }
}
