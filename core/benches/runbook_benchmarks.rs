use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use runbook::{
  substitute, Execution, GlobalConfig, Interpreter, LinkStep, OutputBuffer, PipelineDefinition, Step,
  StepSelection, Variables,
};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime; // To run async code within Criterion

// --- Helpers ---

fn bench_vars(count: usize) -> Variables {
  (0..count).map(|i| (format!("var{}", i), format!("value-{}", i))).collect()
}

fn link_pipeline(num_steps: usize) -> Arc<PipelineDefinition> {
  let steps: Vec<Arc<dyn Step>> = (0..num_steps)
    .map(|i| Arc::new(LinkStep::new(format!("link_{}", i), "https://example.com")) as Arc<dyn Step>)
    .collect();
  Arc::new(PipelineDefinition::new("Bench", "link-only pipeline", steps))
}

fn pipeline_json(num_steps: usize) -> String {
  let steps: Vec<String> = (0..num_steps)
    .map(|i| {
      format!(
        r#"{{ "Type": "PS", "Name": "step_{i}", "ScriptPath": "$(var0)/step_{i}.ps1", "Arguments": ["$(var1)", "-Index", "{i}"], "DependsOn": [] }}"#
      )
    })
    .collect();
  format!(r#"{{ "Name": "Bench", "Description": "parse", "Steps": [{}] }}"#, steps.join(","))
}

// --- Benchmark Functions ---

fn bench_substitution(c: &mut Criterion) {
  let mut group = c.benchmark_group("Substitution");

  for num_refs in [0, 4, 32].iter() {
    let vars = bench_vars(8);
    let text: String = (0..*num_refs).map(|i| format!("/path/$(var{})/x", i % 8)).collect();
    group.throughput(Throughput::Elements(*num_refs as u64));
    group.bench_with_input(BenchmarkId::from_parameter(num_refs), &text, |b, text| {
      b.iter(|| criterion::black_box(substitute(text, &vars)))
    });
  }
  group.finish();
}

fn bench_pipeline_parse(c: &mut Criterion) {
  let mut group = c.benchmark_group("PipelineParse");
  let cfg = GlobalConfig::new(bench_vars(8), Interpreter::new("pwsh", &["-NoProfile"]));

  for num_steps in [1, 10, 50].iter() {
    let text = pipeline_json(*num_steps);
    group.throughput(Throughput::Elements(*num_steps as u64));
    group.bench_with_input(BenchmarkId::from_parameter(num_steps), &text, |b, text| {
      b.iter(|| PipelineDefinition::from_json_str(Path::new("bench.json"), text, &cfg).unwrap())
    });
  }
  group.finish();
}

fn bench_link_execution(c: &mut Criterion) {
  let mut group = c.benchmark_group("LinkExecution");
  let rt = Runtime::new().unwrap();

  for num_steps in [1, 10, 50].iter() {
    let pipeline = link_pipeline(*num_steps);
    let selection: Vec<StepSelection> = pipeline
      .steps()
      .iter()
      .map(|s| StepSelection::checked(s.show_as()))
      .collect();

    group.throughput(Throughput::Elements(*num_steps as u64));
    group.bench_with_input(BenchmarkId::from_parameter(num_steps), num_steps, |b, _| {
      b.to_async(&rt).iter_batched(
        || Execution::new(Some(pipeline.clone()), selection.clone()).unwrap(),
        |execution| async move { execution.execute().await },
        criterion::BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

fn bench_output_buffer(c: &mut Criterion) {
  let mut group = c.benchmark_group("OutputBuffer");
  group.bench_function("append_line", |b| {
    b.iter_batched(
      OutputBuffer::new,
      |out| out.append_line(criterion::black_box(r"it's C:\build\out")),
      criterion::BatchSize::SmallInput,
    )
  });

  let filled = OutputBuffer::new();
  for i in 0..1000 {
    filled.append_line(&format!("line {}", i));
  }
  group.bench_function("snapshot_1000_lines", |b| b.iter(|| criterion::black_box(filled.snapshot())));
  group.finish();
}

criterion_group!(
  benches,
  bench_substitution,
  bench_pipeline_parse,
  bench_link_execution,
  bench_output_buffer
);
criterion_main!(benches);
