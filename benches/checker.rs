//! Benchmarks for differentiability checking.
//!
//! Covers the three cost centers:
//! - straight-line functions (the common fast path)
//! - structured conditionals (arm-walk merge checking)
//! - whole-module parallel checks with diagnostic collection

extern crate gradscope;

use criterion::{criterion_group, criterion_main, Criterion};
use gradscope::prelude::*;
use std::hint::black_box;

const FLOAT: TypeId = TypeId::new(0);
const MODEL: TypeId = TypeId::new(1);
const WRAPPER: TypeId = TypeId::new(2);

fn oracle() -> StaticOracle {
    StaticOracle::new()
        .differentiable(FLOAT)
        .differentiable(MODEL)
        .named(MODEL, "Model")
        .member(MODEL, "weight")
}

/// A straight-line polynomial body of `ops` arithmetic instructions.
fn straight_line(name: &str, ops: u32) -> Function {
    let mut b = FunctionBuilder::new(name, 1);
    b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
    let x = b.param(0);
    let mut acc = x;
    for i in 0..ops {
        acc = b.binary(BinaryOp::Mul, acc, x, SourceLoc::new(i + 2, 3));
    }
    b.ret(Some(acc), SourceLoc::new(ops + 2, 3));
    b.finish().unwrap()
}

/// A chain of `count` sequential structured merges.
fn diamond_chain(name: &str, count: u32) -> Function {
    let mut b = FunctionBuilder::new(name, 2);
    b.set_request(DiffRequest::new(vec![0], SourceLoc::new(1, 1)));
    let x = b.param(0);
    let flag = b.param(1);
    b.block("entry");
    for i in 0..count {
        let line = i * 4 + 2;
        b.cond_br(flag, format!("t{i}"), format!("e{i}"), SourceLoc::new(line, 3));
        b.block(format!("t{i}"));
        b.br(format!("m{i}"), SourceLoc::new(line + 1, 5));
        b.block(format!("e{i}"));
        b.br(format!("m{i}"), SourceLoc::new(line + 2, 5));
        b.block(format!("m{i}"));
    }
    b.ret(Some(x), SourceLoc::new(count * 4 + 2, 3));
    b.finish().unwrap()
}

/// A function that accumulates several findings.
fn failing(name: &str, decl_line: u32) -> Function {
    let mut b = FunctionBuilder::new(name, 1);
    b.set_request(DiffRequest::new(vec![0], SourceLoc::new(decl_line, 1)));
    let s = b.param(0);
    b.try_apply("throwing", vec![], true, SourceLoc::new(decl_line + 1, 3));
    let proj = b.projected_get(MODEL, "y", WRAPPER, Some(s), SourceLoc::new(decl_line + 2, 3));
    let v = b.get(WRAPPER, "value", FLOAT, Some(proj), SourceLoc::new(decl_line + 2, 12));
    let scaled = b.binary(BinaryOp::Mul, v, v, SourceLoc::new(decl_line + 3, 3));
    b.ret(Some(scaled), SourceLoc::new(decl_line + 4, 3));
    b.finish().unwrap()
}

fn bench_straight_line(c: &mut Criterion) {
    let func = straight_line("poly", 64);
    let o = oracle();
    c.bench_function("check_straight_line_64_ops", |b| {
        b.iter(|| black_box(check_function(black_box(&func), &o)));
    });
}

fn bench_diamond_chain(c: &mut Criterion) {
    let func = diamond_chain("diamonds", 32);
    let o = oracle();
    c.bench_function("check_diamond_chain_32", |b| {
        b.iter(|| black_box(check_function(black_box(&func), &o)));
    });
}

fn bench_failing_function(c: &mut Criterion) {
    let func = failing("bad", 1);
    let o = oracle();
    c.bench_function("check_failing_function", |b| {
        b.iter(|| black_box(check_function(black_box(&func), &o)));
    });
}

fn bench_module(c: &mut Criterion) {
    let funcs: Vec<Function> = (0..128u32)
        .map(|i| {
            let line = i * 8 + 1;
            if i % 4 == 0 {
                failing(&format!("bad_{i}"), line)
            } else {
                straight_line(&format!("ok_{i}"), 16)
            }
        })
        .collect();
    let o = oracle();
    c.bench_function("check_module_128_functions", |b| {
        b.iter(|| black_box(check_module(black_box(&funcs), &o)));
    });
}

criterion_group!(
    benches,
    bench_straight_line,
    bench_diamond_chain,
    bench_failing_function,
    bench_module
);
criterion_main!(benches);
