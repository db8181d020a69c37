//! Framework de testes do kernel
//!
//! As suites são tabelas de `TestCase` declaradas com `kernel_test_suite!`. No boot (feature
//! `self_test`) elas rodam via `run_test_suite`; no host (`cargo test`) o mesmo macro gera um
//! `#[test]` por caso, que sobe a plataforma hospedada antes de executar.

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

impl TestCase {
    pub const fn new(name: &'static str, func: fn() -> TestResult) -> Self {
        Self { name, func }
    }
}

/// Executa suite de testes. Retorna (passed, failed, skipped).
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::kinfo!("=== Executando suite: ", str name);

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        match (test.func)() {
            TestResult::Passed => {
                crate::kinfo!("[PASS] ", str test.name);
                passed += 1;
            }
            TestResult::Failed => {
                crate::kerror!("[FAIL] ", str test.name);
                failed += 1;
            }
            TestResult::Skipped => {
                crate::kwarn!("[SKIP] ", str test.name);
                skipped += 1;
            }
        }
    }

    crate::kinfo!("Resultados: passed=", passed as u64);
    if failed > 0 {
        crate::kerror!("Resultados: failed=", failed as u64);
    }
    (passed, failed, skipped)
}

/// Declara uma suite de testes.
///
/// ```ignore
/// kernel_test_suite! {
///     pub PMM_TESTS = [test_alloc, test_ref_split];
/// }
/// ```
#[macro_export]
macro_rules! kernel_test_suite {
    ($vis:vis $suite:ident = [ $($case:ident),* $(,)? ];) => {
        $vis const $suite: &[$crate::klib::test_framework::TestCase] = &[
            $( $crate::klib::test_framework::TestCase::new(stringify!($case), $case), )*
        ];

        #[cfg(test)]
        mod host {
            $(
                #[test]
                fn $case() {
                    $crate::testing::boot();
                    assert_eq!(
                        super::$case(),
                        $crate::klib::test_framework::TestResult::Passed
                    );
                }
            )*
        }
    };
}

/// Falha o teste corrente (retorna `TestResult::Failed`) se a condição for falsa.
#[macro_export]
macro_rules! kcheck {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            $crate::kerror!("(Test) Falhou: ", str $msg);
            return $crate::klib::test_framework::TestResult::Failed;
        }
    };
    ($cond:expr, $msg:expr, $val:expr) => {
        if !$cond {
            $crate::kerror!($msg, $val);
            return $crate::klib::test_framework::TestResult::Failed;
        }
    };
}
