//! Integration tests for the language indexers.
//!
//! These run the registered indexers through the public API on realistic
//! source files.

use codesub::analysis::{get_indexer_for_path, ConstructKind, FileIndex, Lookup};

fn index(path: &str, source: &str) -> FileIndex {
    let indexer = get_indexer_for_path(path).expect("indexer should be registered");
    indexer.analyze(source, path).expect("analysis should succeed")
}

fn qualnames(index: &FileIndex) -> Vec<(&str, ConstructKind)> {
    index
        .constructs
        .iter()
        .map(|c| (c.qualname.as_str(), c.kind))
        .collect()
}

const SERVICE_PY: &str = r#"import logging
from dataclasses import dataclass
from .store import Store as Backend

MAX_RETRIES = 3
_cache = {}


class Status(Enum):
    ACTIVE = 1
    DISABLED = 2


@dataclass
class Service(Backend):
    name: str = "svc"

    @staticmethod
    def build(*args, **kwargs):
        return Service()

    async def fetch(self, key, /, default=None, *, timeout: float = 1.0) -> str:
        return await self.get(key)

    class Config:
        debug = False


def helper():
    return MAX_RETRIES
"#;

#[test]
fn test_python_constructs() {
    let index = index("app/service.py", SERVICE_PY);
    assert!(index.syntax_error.is_none());
    assert_eq!(
        qualnames(&index),
        vec![
            ("MAX_RETRIES", ConstructKind::Variable),
            ("_cache", ConstructKind::Variable),
            ("Status", ConstructKind::Enum),
            ("Status.ACTIVE", ConstructKind::Field),
            ("Status.DISABLED", ConstructKind::Field),
            ("Service", ConstructKind::Class),
            ("Service.name", ConstructKind::Field),
            ("Service.build", ConstructKind::Method),
            ("Service.fetch", ConstructKind::Method),
            ("Service.Config", ConstructKind::Class),
            ("Service.Config.debug", ConstructKind::Field),
            ("helper", ConstructKind::Function),
        ]
    );

    let service = index.lookup("Service", None).into_unique().unwrap();
    // decorated definitions start at the decorator
    assert_eq!(service.start_line, 14);
    assert_eq!(service.definition_line, 15);
    assert_eq!(service.base_classes, vec!["Backend".to_string()]);

    let constant = index.lookup("MAX_RETRIES", None).into_unique().unwrap();
    assert!(constant.has_role("const"));
    assert!(index.lookup("_cache", None).into_unique().unwrap().private);

    assert_eq!(
        index.imports.get("Backend").map(|b| b.module.as_str()),
        Some(".store")
    );
    assert!(index.imports.contains_key("logging"));
}

#[test]
fn test_python_parse_error_is_recorded() {
    let index = index("broken.py", "def ok():\n    return 1\n\ndef bad(:\n    pass\n");
    assert!(index.syntax_error.is_some());
    let ok = index.lookup("ok", None).into_unique().unwrap();
    assert!(!ok.has_parse_error);
}

const CALC_JAVA: &str = r#"package com.example;

import java.util.List;
import com.example.base.Shape;

public class Calc extends Shape implements Comparable<Calc> {
    public static final int LIMIT = 10;
    private int total, count;

    public Calc() {
        this.total = 0;
    }

    public int add(int a, int b) {
        return a + b;
    }

    public double add(double a, double b) {
        return a + b;
    }

    static <T> List<T> pack(T... items) {
        return List.of(items);
    }

    enum Mode { FAST, SAFE }

    interface Listener {
        void onChange(int value);
    }
}
"#;

#[test]
fn test_java_constructs() {
    let index = index("src/main/java/com/example/Calc.java", CALC_JAVA);
    assert!(index.syntax_error.is_none());
    assert_eq!(
        qualnames(&index),
        vec![
            ("Calc", ConstructKind::Class),
            ("Calc.LIMIT", ConstructKind::Field),
            ("Calc.total", ConstructKind::Field),
            ("Calc.count", ConstructKind::Field),
            ("Calc.Calc()", ConstructKind::Method),
            ("Calc.add(int,int)", ConstructKind::Method),
            ("Calc.add(double,double)", ConstructKind::Method),
            ("Calc.pack(T...)", ConstructKind::Method),
            ("Calc.Mode", ConstructKind::Enum),
            ("Calc.Mode.FAST", ConstructKind::Field),
            ("Calc.Mode.SAFE", ConstructKind::Field),
            ("Calc.Listener", ConstructKind::Interface),
            ("Calc.Listener.onChange(int)", ConstructKind::Method),
        ]
    );

    let calc = index.lookup("Calc", None).into_unique().unwrap();
    assert_eq!(
        calc.base_classes,
        vec!["Shape".to_string(), "Comparable".to_string()]
    );
    assert!(index
        .lookup("Calc.LIMIT", None)
        .into_unique()
        .unwrap()
        .has_role("const"));
    assert!(index.lookup("Calc.total", None).into_unique().unwrap().private);
    assert!(index
        .lookup("Calc.Calc()", None)
        .into_unique()
        .unwrap()
        .has_role("constructor"));
    assert!(index
        .lookup("Calc.Mode.FAST", None)
        .into_unique()
        .unwrap()
        .has_role("enum_constant"));

    assert!(matches!(index.lookup("Calc.add", None), Lookup::NotFound));
    assert_eq!(
        index.imports.get("Shape").map(|b| b.module.as_str()),
        Some("com.example.base")
    );
}

#[test]
fn test_java_overloads_have_distinct_hashes() {
    let index = index("Calc.java", CALC_JAVA);
    let ints = index.lookup("Calc.add(int,int)", None).into_unique().unwrap();
    let doubles = index
        .lookup("Calc.add(double,double)", None)
        .into_unique()
        .unwrap();
    assert_ne!(ints.interface_hash, doubles.interface_hash);
    assert_eq!(ints.body_hash, doubles.body_hash);
}

#[test]
fn test_unknown_extension_has_no_indexer() {
    assert!(get_indexer_for_path("README.md").is_none());
    assert!(get_indexer_for_path("Makefile").is_none());
    assert!(get_indexer_for_path("stubs/api.pyi").is_some());
}
