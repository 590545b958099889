// Breaking breakpoint resumed by an async debugger session

use std::sync::Arc;
use stmt_debug::{
    session_channel, Breakpoint, BreakpointRegistry, Evaluator, ProcessOutput, QueryMatcher,
    QueryType, Resume, StatementInfo, StaticProcessor,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("stmt_debug=debug")
        .init();

    println!("🔧 Setting up breaking breakpoint on DELETE statements...\n");

    let registry = Arc::new(BreakpointRegistry::new());
    registry.add(
        Breakpoint::builder(1)
            .matcher(QueryMatcher::new().with_query_types([QueryType::Delete]))
            .breaking(true)
            .after(StaticProcessor::new("delete inspected"))
            .build(),
    )?;

    let (channel, mut session) = session_channel(16);
    let evaluator = Evaluator::new(registry).with_suspend_handler(channel);

    let mut intercepted = Vec::new();
    let statements = ["DELETE FROM book WHERE id = 1", "DELETE FROM book"];
    for (n, sql) in statements.into_iter().enumerate() {
        let evaluator = evaluator.clone();
        intercepted.push(tokio::task::spawn_blocking(move || {
            let info = StatementInfo::new(sql).with_thread(n as u64, format!("conn-{}", n));
            evaluator.execute(&info, |info: &StatementInfo| -> anyhow::Result<ProcessOutput> {
                Ok(ProcessOutput::String(format!("executed: {}", info.sql())))
            })
        }));
    }

    // Let the targeted delete through, skip the unbounded one
    for _ in 0..intercepted.len() {
        let Some(pending) = session.next_hit().await else {
            break;
        };
        let sql = pending.hit.statement.sql();
        let decision = if sql.contains("WHERE") { Resume::Run } else { Resume::Skip };
        println!("⏸  Suspended on '{}' → {:?}", sql, decision);
        pending.resume(decision);
    }

    for task in intercepted {
        let execution = task.await??;
        println!("✅ {}", serde_json::to_string(&execution)?);
    }

    Ok(())
}
