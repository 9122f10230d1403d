//! Performance benchmarks for boardsync-engine

use boardsync_engine::{
    reindex, Board, CardStatus, ListSnapshot, OrderIndex, Sibling, TodoSnapshot,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn shuffled_siblings(n: usize) -> Vec<Sibling> {
    (0..n)
        .map(|i| Sibling::new(format!("id_{i}"), ((i * 7919) % n) as OrderIndex))
        .collect()
}

fn bench_reindex(c: &mut Criterion) {
    let mut group = c.benchmark_group("reindex");

    for size in [10usize, 100, 1_000, 10_000] {
        let siblings = shuffled_siblings(size);
        group.bench_with_input(BenchmarkId::new("shuffled", size), &siblings, |b, s| {
            b.iter(|| reindex(black_box(s), None))
        });

        let contiguous: Vec<Sibling> = (0..size)
            .map(|i| Sibling::new(format!("id_{i}"), i as OrderIndex))
            .collect();
        group.bench_with_input(BenchmarkId::new("no_op", size), &contiguous, |b, s| {
            b.iter(|| reindex(black_box(s), None))
        });
    }

    group.finish();
}

fn bench_board_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("board_merge");

    let lists: Vec<ListSnapshot> = (0..50)
        .map(|i| ListSnapshot {
            id: format!("l{i}"),
            title: format!("list {i}"),
            order: i as OrderIndex,
            card_status: CardStatus::Todo,
        })
        .collect();
    let todos: Vec<TodoSnapshot> = (0..200)
        .map(|i| TodoSnapshot {
            id: format!("t{i}"),
            title: format!("todo {i}"),
            description: String::new(),
            order: i as OrderIndex,
        })
        .collect();

    group.bench_function("set_lists_50", |b| {
        let mut board = Board::new();
        board.set_lists(lists.clone());
        b.iter(|| board.set_lists(black_box(lists.clone())))
    });

    group.bench_function("set_todos_200", |b| {
        let mut board = Board::new();
        board.set_lists(lists.clone());
        b.iter(|| board.set_todos(black_box("l0"), black_box(todos.clone())))
    });

    group.finish();
}

criterion_group!(benches, bench_reindex, bench_board_merge);
criterion_main!(benches);
