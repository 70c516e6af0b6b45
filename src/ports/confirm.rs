/// Blocking yes/no question asked before a destructive action.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}
