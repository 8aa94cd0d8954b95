use brrtdoc::request::RequestParts;
use brrtdoc::schema::{schema_type, Schema};
use brrtdoc::security::{AuthDecision, PolicyOptions, RequestEvaluator, SchemeRegistry, SecurityScheme};
use brrtdoc::spec::{
    ApiKeyLocation, Info, MediaType, ObjectOrReference, OpenApiDocument, Operation, PathItem, Response,
    SecurityRequirement,
};
use brrtdoc::canonicalize_annotated_schemas;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeMap;
use std::hint::black_box;

/// `routes` paths, each returning a list of a shared tagged type plus one
/// route-specific tagged wrapper.
fn build_document(routes: usize) -> OpenApiDocument {
    let item = schema_type(
        "Item",
        Schema::object()
            .required_property("id", Schema::integer())
            .property("label", Schema::string()),
    );

    let mut doc = OpenApiDocument::new(Info::new("bench", "1.0.0"));
    for i in 0..routes {
        let page = schema_type(
            format!("Page{i}"),
            Schema::object()
                .property("items", Schema::array(item.clone()))
                .property("next", Schema::string()),
        );
        let mut path = PathItem::default();
        path.get = Some(Operation {
            responses: BTreeMap::from([(
                "200".to_string(),
                ObjectOrReference::Object(Response {
                    description: "ok".into(),
                    content: BTreeMap::from([("application/json".to_string(), MediaType::with_schema(page))]),
                    ..Response::default()
                }),
            )]),
            ..Operation::default()
        });
        doc.paths.insert(format!("/collection{i}"), path);
    }
    doc
}

fn bench_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonicalize_annotated_schemas");
    for routes in [10usize, 100, 500] {
        let doc = build_document(routes);
        group.bench_with_input(BenchmarkId::from_parameter(routes), &doc, |b, doc| {
            b.iter(|| {
                let mut working = doc.clone();
                canonicalize_annotated_schemas(&mut working).unwrap();
                black_box(working)
            });
        });
    }
    group.finish();
}

fn key_scheme(header: &str) -> SecurityScheme {
    SecurityScheme::api_key(header, ApiKeyLocation::Header, |key, _, _| {
        Ok(if key == Some("ok") { AuthDecision::Allow } else { AuthDecision::unauthorized() })
    })
}

fn bench_evaluate(c: &mut Criterion) {
    let registry = SchemeRegistry::new()
        .with("A", key_scheme("x-a"))
        .with("B", key_scheme("x-b"))
        .with("C", key_scheme("x-c"));
    let clauses = vec![
        SecurityRequirement::new().scheme("A").scheme("B"),
        SecurityRequirement::new().scheme("C"),
    ];
    let evaluator = RequestEvaluator::compile(&clauses, &registry, &PolicyOptions::default()).unwrap();

    let first_clause = RequestParts::new("GET", "/").header("x-a", "ok").header("x-b", "ok");
    let second_clause = RequestParts::new("GET", "/").header("x-c", "ok");
    let denied = RequestParts::new("GET", "/").header("x-a", "ok");

    let mut group = c.benchmark_group("security_evaluate");
    for (name, req) in [
        ("first_clause", &first_clause),
        ("second_clause", &second_clause),
        ("denied", &denied),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| black_box(evaluator.evaluate(&req.as_security_request())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_canonicalize, bench_evaluate);
criterion_main!(benches);
