use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use stepwise_core::mock::{mock_registry, MockQuestion, ANSWER_VAR};
use stepwise_core::{ActionOptions, AttemptView, QuestionAttempt, SubmittedData};
use uuid::Uuid;

fn make_attempt(saves: usize) -> QuestionAttempt {
    let mut qa = QuestionAttempt::new(
        Arc::new(MockQuestion::new("42")),
        Uuid::nil(),
        mock_registry(),
    );
    qa.start("mock".into(), 1, SubmittedData::new(), ActionOptions::default())
        .unwrap();
    for i in 0..saves {
        qa.process_action(
            SubmittedData::new().with_qt(ANSWER_VAR, i.to_string()),
            ActionOptions::default(),
        )
        .unwrap();
    }
    qa.finish(ActionOptions::default()).unwrap();
    qa
}

fn bench_regrade(c: &mut Criterion) {
    let mut group = c.benchmark_group("regrade");

    for saves in [5, 50, 500] {
        let qa = make_attempt(saves);
        group.bench_function(format!("steps={}", qa.num_steps()), |b| {
            b.iter(|| black_box(&qa).regrade_copy(None, true).unwrap())
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");
    let qa = make_attempt(500);

    group.bench_function("last_qt_var", |b| {
        b.iter(|| black_box(&qa).last_qt_var(black_box(ANSWER_VAR)))
    });

    group.bench_function("at_step_middle", |b| {
        b.iter(|| black_box(&qa).at_step(black_box(250)).unwrap().state())
    });

    group.bench_function("to_records", |b| b.iter(|| black_box(&qa).to_records()));

    group.finish();
}

criterion_group!(benches, bench_regrade, bench_queries);
criterion_main!(benches);
