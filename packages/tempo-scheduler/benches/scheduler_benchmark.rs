use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempo_scheduler::{
    MessageExecutor, Priority, ScheduleOptions, Scheduler, TaskStep, VirtualHost,
};

fn benchmark_schedule_and_drain(c: &mut Criterion) {
    c.bench_function("schedule_and_drain 1000", |b| {
        b.iter(|| {
            let host = VirtualHost::new();
            let scheduler = Scheduler::new(Box::new(MessageExecutor::new(host.clone())));
            for _ in 0..1000 {
                scheduler.schedule(
                    Box::new(|_| {
                        black_box(1 + 1);
                        TaskStep::Done
                    }),
                    ScheduleOptions::default(),
                );
            }
            host.run_until_idle();
        })
    });
}

fn benchmark_mixed_priorities(c: &mut Criterion) {
    let priorities = [
        Priority::Immediate,
        Priority::UserBlocking,
        Priority::Normal,
        Priority::Low,
        Priority::Idle,
    ];
    c.bench_function("schedule_mixed_priorities 1000", |b| {
        b.iter(|| {
            let host = VirtualHost::new();
            let scheduler = Scheduler::new(Box::new(MessageExecutor::new(host.clone())));
            for n in 0..1000 {
                scheduler.schedule(
                    Box::new(|_| {
                        black_box(1 + 1);
                        TaskStep::Done
                    }),
                    ScheduleOptions::priority(priorities[n % priorities.len()]),
                );
            }
            host.run_until_idle();
        })
    });
}

fn benchmark_heap_churn(c: &mut Criterion) {
    use tempo_scheduler::heap::MinHeap;
    c.bench_function("heap_insert_remove 1000", |b| {
        b.iter(|| {
            let mut heap = MinHeap::new();
            for n in 0..1000u32 {
                heap.insert(black_box(n.wrapping_mul(2_654_435_761)));
            }
            while heap.remove().is_some() {}
        })
    });
}

criterion_group!(
    benches,
    benchmark_schedule_and_drain,
    benchmark_mixed_priorities,
    benchmark_heap_churn
);
criterion_main!(benches);
