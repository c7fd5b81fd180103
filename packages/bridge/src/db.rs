use async_trait::async_trait;
use skiff_core::{
    decode_query_result, decode_reply, encode_request, BeginReply, Database, Error, ExecReply,
    ExecResult, QueryRequest, Rows, Statement, Transaction, TxRequest, Value,
};

use crate::host::{HostCalls, HostOp};

const BACKEND: &str = "bridge";

/// Database adapter that satisfies the same contract as the native adapters
/// by round-tripping every call through the host import surface.
pub struct BridgeDatabase<H: HostCalls> {
    host: H,
}

impl<H: HostCalls> BridgeDatabase<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn run(&self, op: HostOp, sql: &str, args: &[Value], tx: Option<u32>) -> Result<Vec<u8>, Error> {
        let request = QueryRequest {
            sql: sql.to_string(),
            args: args.to_vec(),
            tx,
        };
        let payload = encode_request(&request)?;
        self.host
            .call(op, &payload)
            .map_err(|err| err.context(op.name()))
    }

    fn run_query(&self, sql: &str, args: &[Value], tx: Option<u32>) -> Result<Rows, Error> {
        let reply = self.run(HostOp::DbQuery, sql, args, tx)?;
        Rows::new(decode_query_result(&reply)?)
    }

    fn run_exec(&self, sql: &str, args: &[Value], tx: Option<u32>) -> Result<ExecResult, Error> {
        let reply = self.run(HostOp::DbExecute, sql, args, tx)?;
        let exec: ExecReply = decode_reply(&reply)?;
        // No meaningful insert id crosses the boundary; last_insert_id on
        // this result fails rather than reporting zero.
        Ok(ExecResult::new(exec.rows_affected, None, BACKEND))
    }
}

#[cfg(target_arch = "wasm32")]
impl BridgeDatabase<crate::host::WasmHost> {
    /// The adapter wired to the real import surface.
    pub fn over_boundary() -> Self {
        Self::new(crate::host::WasmHost)
    }
}

#[async_trait(?Send)]
impl<H: HostCalls> Database for BridgeDatabase<H> {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn ping(&self) -> Result<(), Error> {
        // The import surface has no dedicated liveness call; a constant
        // select proves the round trip without mutating anything.
        self.run_query("SELECT 1", &[], None).map(|_| ())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction + '_>, Error> {
        let reply = self
            .host
            .call(HostOp::DbBegin, &[])
            .map_err(|err| err.context(HostOp::DbBegin.name()))?;
        let begin: BeginReply = decode_reply(&reply)?;
        Ok(Box::new(BridgeTransaction {
            db: self,
            handle: begin.tx,
            done: false,
        }))
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows, Error> {
        self.run_query(sql, args, None)
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
        self.run_exec(sql, args, None)
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn Statement + '_>, Error> {
        let _ = sql;
        // No prepared-statement import exists; failing beats silently
        // executing unprepared.
        Err(Error::unsupported("prepare", BACKEND))
    }
}

/// Transaction routed through a host-assigned integer handle. Commit and
/// rollback invalidate the handle locally, so a buggy caller fails fast on
/// this side instead of round-tripping to the host.
struct BridgeTransaction<'a, H: HostCalls> {
    db: &'a BridgeDatabase<H>,
    handle: u32,
    done: bool,
}

impl<H: HostCalls> BridgeTransaction<'_, H> {
    fn live(&self) -> Result<(), Error> {
        if self.done {
            return Err(Error::invalid_handle(format!(
                "transaction handle {} already committed or rolled back",
                self.handle
            )));
        }
        Ok(())
    }

    fn finish(&mut self, op: HostOp) -> Result<(), Error> {
        self.live()?;
        // Terminal regardless of the host outcome: after a failed commit the
        // host-side state is unknown, and reusing the handle would be worse.
        self.done = true;
        let payload = encode_request(&TxRequest { tx: self.handle })?;
        let reply = self
            .db
            .host
            .call(op, &payload)
            .map_err(|err| err.context(op.name()))?;
        decode_reply::<()>(&reply)
    }
}

impl<H: HostCalls> Drop for BridgeTransaction<'_, H> {
    fn drop(&mut self) {
        // An unresolved handle must not leave the host transaction open:
        // later non-transactional reads would see uncommitted rows, and a
        // single-transaction host would refuse the next begin.
        if !self.done {
            self.done = true;
            if let Ok(payload) = encode_request(&TxRequest { tx: self.handle }) {
                let _ = self.db.host.call(HostOp::DbRollback, &payload);
            }
        }
    }
}

#[async_trait(?Send)]
impl<H: HostCalls> Transaction for BridgeTransaction<'_, H> {
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Rows, Error> {
        self.live()?;
        self.db.run_query(sql, args, Some(self.handle))
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<ExecResult, Error> {
        self.live()?;
        self.db.run_exec(sql, args, Some(self.handle))
    }

    async fn commit(&mut self) -> Result<(), Error> {
        self.finish(HostOp::DbCommit)
    }

    async fn rollback(&mut self) -> Result<(), Error> {
        self.finish(HostOp::DbRollback)
    }
}
