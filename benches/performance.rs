use quire::{
    Editor, EditorConfig, Key, Position, Selection,
    convert::{export_markdown, import_markdown},
    render::render_tree,
    schedule::ManualClock,
    tree::{InlineStyle, NodeId},
};
use std::time::{Duration, Instant};

/// Performance benchmark suite for quire editing operations
///
/// Run with: cargo test --release --bench performance -- --nocapture
///
/// This measures:
/// - Markup loading and normalization
/// - Rendering of large documents
/// - Typing with autoformat and history capture
/// - List surgery (toggle, indent, outdent)
/// - Undo and redo over long histories
const SMALL_DOC_BLOCKS: usize = 10;
const MEDIUM_DOC_BLOCKS: usize = 100;
const LARGE_DOC_BLOCKS: usize = 1000;
const HUGE_DOC_BLOCKS: usize = 10000;

const ITERATIONS: usize = 100;

const SAMPLE_WORDS: &[&str] = &[
    "Lorem",
    "ipsum",
    "dolor",
    "sit",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "sed",
    "do",
    "eiusmod",
    "tempor",
    "incididunt",
    "ut",
    "labore",
    "et",
    "dolore",
    "magna",
    "aliqua",
];

fn sample_text(words: usize, seed: usize) -> String {
    let mut text = String::new();
    for j in 0..words {
        if j > 0 {
            text.push(' ');
        }
        text.push_str(SAMPLE_WORDS[(seed + j) % SAMPLE_WORDS.len()]);
    }
    text
}

/// Markup with a rotating mix of block types.
fn create_test_markup(num_blocks: usize, words_per_block: usize) -> String {
    let mut markup = String::new();
    for i in 0..num_blocks {
        let text = sample_text(words_per_block, i);
        let block = match i % 6 {
            0 => format!("<h1>{text}</h1>"),
            1 => format!("<h2>{text}</h2>"),
            2 => format!("<blockquote>{text}</blockquote>"),
            3 => format!("<pre>{text}</pre>"),
            4 => format!("<p><b>{text}</b> and <i>more</i></p>"),
            _ => format!("<p>{text}</p>"),
        };
        markup.push_str(&block);
        markup.push('\n');
    }
    markup
}

/// A checklist with `items` entries, every third one holding a nested list.
fn create_list_markup(items: usize) -> String {
    let mut markup = String::from("<ul data-checklist=\"true\">");
    for i in 0..items {
        let checked = i % 2 == 0;
        markup.push_str(&format!(
            "<li data-checked=\"{checked}\">{}",
            sample_text(5, i)
        ));
        if i % 3 == 0 {
            markup.push_str(&format!("<ol><li>{}</li></ol>", sample_text(3, i + 1)));
        }
        markup.push_str("</li>");
    }
    markup.push_str("</ul>\n");
    markup
}

fn editor_with(markup: &str) -> Editor {
    let mut editor = Editor::new(EditorConfig::default());
    editor
        .load_markup(markup)
        .expect("benchmark markup should parse");
    editor
}

fn text_nodes(editor: &Editor) -> Vec<NodeId> {
    let tree = editor.tree();
    tree.descendants(tree.root())
        .into_iter()
        .filter(|id| tree.text(*id).is_some_and(|text| !text.is_empty()))
        .collect()
}

fn place_caret(editor: &mut Editor, node: NodeId, offset: usize) {
    assert!(editor.set_selection(Selection::caret(Position::new(node, offset))));
}

struct BenchmarkResult {
    name: String,
    iterations: usize,
    total_duration: Duration,
    avg_duration: Duration,
    min_duration: Duration,
    max_duration: Duration,
}

impl BenchmarkResult {
    fn print(&self) {
        println!("\n{}", "=".repeat(70));
        println!("Benchmark: {}", self.name);
        println!("{}", "=".repeat(70));
        println!("Iterations:     {}", self.iterations);
        println!("Total time:     {:?}", self.total_duration);
        println!("Average:        {:?}", self.avg_duration);
        println!("Min:            {:?}", self.min_duration);
        println!("Max:            {:?}", self.max_duration);
        println!(
            "Ops/sec:        {:.2}",
            1_000_000.0 / self.avg_duration.as_micros().max(1) as f64
        );

        if self.avg_duration.as_millis() > 100 {
            println!("\n⚠️  WARNING: Average duration > 100ms (user-perceptible lag)");
        } else if self.avg_duration.as_millis() > 16 {
            println!("\n⚠️  WARNING: Average duration > 16ms (may drop frames)");
        }
    }
}

fn benchmark<F>(name: &str, iterations: usize, mut f: F) -> BenchmarkResult
where
    F: FnMut(),
{
    let mut durations = Vec::with_capacity(iterations);

    // Warmup
    for _ in 0..10 {
        f();
    }

    for _ in 0..iterations {
        let start = Instant::now();
        f();
        durations.push(start.elapsed());
    }

    let total_duration: Duration = durations.iter().sum();
    let avg_duration = total_duration / iterations as u32;
    let min_duration = *durations.iter().min().unwrap();
    let max_duration = *durations.iter().max().unwrap();

    BenchmarkResult {
        name: name.to_string(),
        iterations,
        total_duration,
        avg_duration,
        min_duration,
        max_duration,
    }
}

fn sized_documents() -> Vec<(&'static str, String)> {
    vec![
        (
            "Small (10 blocks)",
            create_test_markup(SMALL_DOC_BLOCKS, 20),
        ),
        (
            "Medium (100 blocks)",
            create_test_markup(MEDIUM_DOC_BLOCKS, 20),
        ),
        (
            "Large (1000 blocks)",
            create_test_markup(LARGE_DOC_BLOCKS, 20),
        ),
        (
            "Huge (10000 blocks)",
            create_test_markup(HUGE_DOC_BLOCKS, 20),
        ),
    ]
}

fn iterations_for(name: &str) -> usize {
    if name.contains("Huge") { 10 } else { ITERATIONS }
}

#[test]
fn bench_load_and_normalize() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║           LOAD AND NORMALIZE BENCHMARKS                        ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, markup) in sized_documents() {
        let mut editor = Editor::new(EditorConfig::default());
        let result = benchmark(
            &format!("load_markup - {}", name),
            iterations_for(name),
            || {
                editor
                    .load_markup(&markup)
                    .expect("benchmark markup should parse");
            },
        );
        result.print();
    }

    let lists = create_list_markup(LARGE_DOC_BLOCKS);
    let mut editor = editor_with(&lists);
    let result = benchmark("normalize - checklist (1000 items)", ITERATIONS, || {
        editor.normalize();
    });
    result.print();
}

#[test]
fn bench_rendering_performance() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║           RENDERING PERFORMANCE BENCHMARKS                     ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, markup) in sized_documents() {
        let editor = editor_with(&markup);
        let result = benchmark(
            &format!("render_tree - {}", name),
            iterations_for(name),
            || {
                let _ = render_tree(editor.tree(), 80, editor.selection());
            },
        );
        result.print();
    }
}

#[test]
fn bench_wrap_width_impact() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              WRAP WIDTH IMPACT BENCHMARKS                      ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let editor = editor_with(&create_test_markup(MEDIUM_DOC_BLOCKS, 60));
    for width in [20, 40, 80, 120, 200] {
        let result = benchmark(&format!("render_tree - width {}", width), ITERATIONS, || {
            let _ = render_tree(editor.tree(), width, editor.selection());
        });
        result.print();
    }
}

#[test]
fn bench_editing_insert_text() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              TEXT INSERTION BENCHMARKS                         ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, blocks) in [("Medium", MEDIUM_DOC_BLOCKS), ("Large", LARGE_DOC_BLOCKS)] {
        let mut editor = editor_with(&create_test_markup(blocks, 20));
        let nodes = text_nodes(&editor);
        let middle = nodes[nodes.len() / 2];
        place_caret(&mut editor, middle, 0);

        let result = benchmark(
            &format!("handle_key(Char) - {} ({} blocks)", name, blocks),
            ITERATIONS,
            || {
                editor
                    .handle_key(Key::Char('x'))
                    .expect("typing should succeed");
            },
        );
        result.print();
    }

    // Autoformat runs a regex scan on every typed char.
    let mut editor = editor_with("<p>plain</p>\n");
    let nodes = text_nodes(&editor);
    place_caret(&mut editor, nodes[0], 5);
    let result = benchmark("handle_key with autoformat scan", ITERATIONS, || {
        for ch in " **bold**".chars() {
            editor.handle_key(Key::Char(ch)).expect("typing should succeed");
        }
    });
    result.print();
}

#[test]
fn bench_full_edit_cycle() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║           FULL EDIT CYCLE (edit + render)                      ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let mut editor = editor_with(&create_test_markup(LARGE_DOC_BLOCKS, 20));
    let nodes = text_nodes(&editor);
    place_caret(&mut editor, nodes[nodes.len() - 1], 0);

    let result = benchmark("type + render - Large", ITERATIONS, || {
        editor
            .handle_key(Key::Char('a'))
            .expect("typing should succeed");
        let _ = render_tree(editor.tree(), 80, editor.selection());
    });
    result.print();

    let result = benchmark("backspace + render - Large", ITERATIONS, || {
        editor
            .handle_key(Key::Backspace)
            .expect("deleting should succeed");
        let _ = render_tree(editor.tree(), 80, editor.selection());
    });
    result.print();
}

#[test]
fn bench_list_surgery() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              LIST SURGERY BENCHMARKS                           ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let markup = create_list_markup(MEDIUM_DOC_BLOCKS);

    let mut editor = editor_with(&markup);
    let nodes = text_nodes(&editor);
    let target = nodes[nodes.len() / 2];
    let result = benchmark("indent_item + outdent_item", ITERATIONS, || {
        place_caret(&mut editor, target, 0);
        let _ = editor.indent_item();
        let _ = editor.outdent_item();
    });
    result.print();

    let mut editor = editor_with(&markup);
    let first = text_nodes(&editor)[0];
    let result = benchmark("toggle_list ordered/unordered", ITERATIONS, || {
        place_caret(&mut editor, first, 0);
        let _ = editor.toggle_list(true);
    });
    result.print();

    let mut editor = editor_with(&markup);
    let first = text_nodes(&editor)[0];
    let result = benchmark("toggle_item_checked + progress", ITERATIONS, || {
        place_caret(&mut editor, first, 0);
        let _ = editor.toggle_item_checked();
        let _ = editor.caret_list_progress();
    });
    result.print();
}

#[test]
fn bench_styles() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              INLINE STYLE BENCHMARKS                           ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let mut editor = editor_with(&create_test_markup(MEDIUM_DOC_BLOCKS, 20));
    let node = text_nodes(&editor)[MEDIUM_DOC_BLOCKS / 2];
    let result = benchmark("apply_inline_style toggle", ITERATIONS, || {
        assert!(editor.set_selection(Selection {
            start: Position::new(node, 0),
            end: Position::new(node, 5),
        }));
        let _ = editor.apply_inline_style(InlineStyle::Bold);
    });
    result.print();
}

#[test]
fn bench_undo_redo() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              UNDO / REDO BENCHMARKS                            ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let clock = ManualClock::new();
    let mut editor = Editor::new(EditorConfig::default()).with_clock(Box::new(clock.clone()));
    editor
        .load_markup(&create_test_markup(MEDIUM_DOC_BLOCKS, 20))
        .expect("benchmark markup should parse");
    let node = text_nodes(&editor)[0];
    place_caret(&mut editor, node, 0);

    // Step the clock past the debounce window so each char is its own entry.
    for _ in 0..50 {
        editor
            .handle_key(Key::Char('z'))
            .expect("typing should succeed");
        clock.advance(Duration::from_secs(2));
        editor.flush_deferred();
    }

    let result = benchmark("undo + redo (100 blocks)", ITERATIONS, || {
        let _ = editor.undo();
        editor.flush_deferred();
        let _ = editor.redo();
        editor.flush_deferred();
    });
    result.print();
}

#[test]
fn bench_markdown_conversion() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              MARKDOWN CONVERSION BENCHMARKS                    ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    let editor = editor_with(&create_test_markup(LARGE_DOC_BLOCKS, 20));
    let markdown = export_markdown(editor.tree()).expect("export should succeed");

    let result = benchmark("export_markdown - Large", ITERATIONS, || {
        let _ = export_markdown(editor.tree());
    });
    result.print();

    let result = benchmark("import_markdown - Large", ITERATIONS, || {
        let _ = import_markdown(&markdown);
    });
    result.print();
}

#[cfg(test)]
mod summary {
    #[test]
    fn print_summary() {
        println!("\n\n╔════════════════════════════════════════════════════════════════╗");
        println!("║                    BENCHMARK SUMMARY                           ║");
        println!("╚════════════════════════════════════════════════════════════════╝");
        println!("\nTo run all benchmarks:");
        println!("  cargo test --release --bench performance -- --nocapture --test-threads=1");
        println!("\nTo run a specific benchmark:");
        println!(
            "  cargo test --release --bench performance bench_rendering_performance -- --nocapture"
        );
        println!("\nKey metrics to watch:");
        println!("  • Typing latency including autoformat and history capture");
        println!("  • Render time for large documents (runs on every frame)");
        println!("  • Normalization of long checklists");
        println!("\nPerformance targets:");
        println!("  • < 10ms per keypress = smooth typing");
        println!("  • < 16ms per operation = smooth 60 FPS");
        println!("  • > 100ms = noticeable lag");
    }
}
