use std::fmt;

use crate::trust::TrustEvaluator;
use crate::Error;

/// A unit of handshake work to run away from the connection.
///
/// Handed out by [`HandshakeEngine::delegated_task`](crate::HandshakeEngine::delegated_task)
/// when trust checks are delegated. Call [`run`](DelegatedTask::run) on any
/// thread, then give the task back with
/// [`HandshakeEngine::resume`](crate::HandshakeEngine::resume). The handshake
/// makes no progress in between.
pub struct DelegatedTask {
    evaluator: TrustEvaluator,
    chain: Vec<Vec<u8>>,
    auth_type: &'static str,
    server_names: Vec<String>,
    peer_host: Option<String>,
    result: Option<Result<Vec<Vec<u8>>, Error>>,
}

impl DelegatedTask {
    pub(crate) fn trust_check(
        evaluator: TrustEvaluator,
        chain: Vec<Vec<u8>>,
        auth_type: &'static str,
        server_names: Vec<String>,
        peer_host: Option<String>,
    ) -> Self {
        DelegatedTask {
            evaluator,
            chain,
            auth_type,
            server_names,
            peer_host,
            result: None,
        }
    }

    /// Do the work. Running a task twice has no further effect.
    pub fn run(&mut self) {
        if self.result.is_some() {
            return;
        }
        let result = self.evaluator.evaluate(
            &self.chain,
            self.auth_type,
            &self.server_names,
            self.peer_host.as_deref(),
        );
        self.result = Some(result);
    }

    pub fn is_done(&self) -> bool {
        self.result.is_some()
    }

    pub(crate) fn into_result(self) -> Result<Vec<Vec<u8>>, Error> {
        self.result
            .unwrap_or_else(|| Err(Error::InternalError("Delegated task was not run".into())))
    }
}

impl fmt::Debug for DelegatedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedTask")
            .field("auth_type", &self.auth_type)
            .field("chain_len", &self.chain.len())
            .field("done", &self.is_done())
            .finish()
    }
}
