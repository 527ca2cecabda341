/// A short process-unique token, used for throwaway broker route names (e.g. the
/// marker destination `flush()` registers to prove FIFO delivery).
pub fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
