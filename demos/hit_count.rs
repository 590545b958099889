// Hit-count breakpoint fired from several intercepting threads

use std::sync::Arc;
use stmt_debug::{
    Breakpoint, BreakpointRegistry, Evaluator, LogProcessor, Phase, QueryMatcher, QueryType,
    StatementInfo, TextMatcher,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("stmt_debug=debug")
        .init();

    println!("🔧 Registering breakpoint on the 5th UPDATE of AUTHOR...\n");

    let registry = Arc::new(BreakpointRegistry::new());
    let id = registry.next_id();
    registry.add(
        Breakpoint::builder(id)
            .matcher(
                QueryMatcher::new()
                    .with_query_types([QueryType::Update])
                    .with_statement(TextMatcher::contains("author")),
            )
            .hit_count(5)
            .before(LogProcessor::new("fifth author update"))
            .build(),
    )?;
    println!("✓ Breakpoint {} registered", id);

    let evaluator = Evaluator::new(registry);

    std::thread::scope(|s| {
        for worker in 0..4u64 {
            let evaluator = evaluator.clone();
            s.spawn(move || {
                for n in 0..3 {
                    let info = StatementInfo::new(format!("UPDATE author SET visits = {}", n))
                        .with_thread(worker, format!("worker-{}", worker));
                    let dispatch = evaluator.evaluate(&info);
                    if !dispatch.is_empty() {
                        println!(
                            "🎯 worker-{} hit breakpoint(s) {:?}",
                            worker,
                            dispatch.breakpoint_ids()
                        );
                        if let Err(e) = dispatch.run_phase(Phase::Before, &info) {
                            tracing::warn!("Before processor failed on worker-{}: {}", worker, e);
                        }
                    }
                }
            });
        }
    });

    let breakpoint = evaluator.registry().get(id).ok_or("breakpoint vanished")?;
    println!("\n✓ Remaining hit count: {:?}", breakpoint.current_hit_count());

    Ok(())
}
