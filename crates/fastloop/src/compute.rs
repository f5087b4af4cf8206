/// A per-item computation applied to every job in a batch.
///
/// The pool treats implementations as opaque: it hands over `(index,
/// payload)` and stores whatever comes back. Any static arguments shared
/// by all jobs are state of the implementing value itself, which every
/// worker holds through an `Arc`.
///
/// `run` is infallible by contract. Implementations must catch their own
/// failures and encode them in the output type (see `fit::FitStatus` for
/// the canonical example) so that a failing item can never take a worker
/// down with it.
pub trait Computation<P, R>: Send + Sync {
    fn run(&self, index: usize, payload: P) -> R;
}
