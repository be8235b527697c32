use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use regvm::{Assembler, Assertion, Code, Vm};

fn ch(c: char) -> u16 {
    c as u16
}

// \b[a-z]+ing\b
fn words_ending_in_ing(derive_filter: bool) -> Code {
    let mut asm = Assembler::new();
    let top = asm.new_label();
    let exit = asm.new_label();
    asm.assertion(Assertion::WordBoundary);
    asm.check_range(&[(ch('a'), ch('z'))], false);
    asm.bind(top);
    asm.push_backtrack(exit);
    asm.check_range(&[(ch('a'), ch('z'))], false);
    asm.jump(top);
    asm.bind(exit);
    asm.check_n_chars(&[ch('i'), ch('n'), ch('g')]);
    asm.assertion(Assertion::WordBoundary);
    asm.success();
    asm.derive_filter(derive_filter);
    asm.finish(1, 0).unwrap()
}

// (a+)+b, the classic exponential case
fn nested_plus() -> Code {
    let mut asm = Assembler::new();
    let outer = asm.new_label();
    let outer_exit = asm.new_label();
    let inner = asm.new_label();
    let inner_exit = asm.new_label();
    asm.bind(outer);
    asm.start_capture(1);
    asm.check_char(ch('a'));
    asm.bind(inner);
    asm.push_backtrack(inner_exit);
    asm.check_char(ch('a'));
    asm.jump(inner);
    asm.bind(inner_exit);
    asm.end_capture(1);
    asm.push_backtrack(outer_exit);
    asm.jump(outer);
    asm.bind(outer_exit);
    asm.check_char(ch('b'));
    asm.success();
    asm.finish(2, 0).unwrap()
}

// (\w+) \1
fn repeated_word() -> Code {
    let mut asm = Assembler::new();
    let top = asm.new_label();
    let exit = asm.new_label();
    let word = [(ch('0'), ch('9')), (ch('A'), ch('Z')), (ch('_'), ch('_')), (ch('a'), ch('z'))];
    asm.start_capture(1);
    asm.check_range(&word, false);
    asm.bind(top);
    asm.push_backtrack(exit);
    asm.check_range(&word, false);
    asm.jump(top);
    asm.bind(exit);
    asm.end_capture(1);
    asm.check_char(ch(' '));
    asm.back_reference(1, false);
    asm.assertion(Assertion::WordBoundary);
    asm.success();
    asm.finish(2, 0).unwrap()
}

fn text() -> String {
    "the quick brown fox jumps over the lazy dog while singing ".repeat(40)
}

fn search_filtered(c: &mut Criterion) {
    let code = words_ending_in_ing(true);
    let text = text();
    let mut vm = Vm::new();
    c.bench_function("search_filtered", |b| {
        b.iter(|| vm.search(&code, black_box(text.as_bytes()), 0).unwrap())
    });
}

fn search_unfiltered(c: &mut Criterion) {
    let code = words_ending_in_ing(false);
    let text = text();
    let mut vm = Vm::new();
    c.bench_function("search_unfiltered", |b| {
        b.iter(|| vm.search(&code, black_box(text.as_bytes()), 0).unwrap())
    });
}

fn search_wide(c: &mut Criterion) {
    let code = words_ending_in_ing(true);
    let text: Vec<u16> = text().encode_utf16().collect();
    let mut vm = Vm::new();
    c.bench_function("search_wide", |b| {
        b.iter(|| vm.search(&code, black_box(&text), 0).unwrap())
    });
}

fn back_reference(c: &mut Criterion) {
    let code = repeated_word();
    let text = text() + "again and and again";
    let mut vm = Vm::new();
    c.bench_function("back_reference", |b| {
        b.iter(|| vm.search(&code, black_box(text.as_bytes()), 0).unwrap())
    });
}

fn catastrophic_backtracking(c: &mut Criterion) {
    let code = nested_plus();
    let text = "a".repeat(16);
    let mut vm = Vm::new();
    c.bench_function("catastrophic_backtracking", |b| {
        b.iter(|| vm.search(&code, black_box(text.as_bytes()), 0).unwrap())
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = search_filtered,
    search_unfiltered,
    search_wide,
    back_reference,
    catastrophic_backtracking
);

criterion_main!(benches);
