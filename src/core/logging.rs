// =============================================================================
// KERNEL LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Sistema de logging do kernel com custo ZERO em release.
//
// ARQUITETURA:
// Este sistema foi projetado para ser completamente removível em release:
// - Usa features do Cargo para compile-time filtering
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - SEM core::fmt - Evita geração de código SSE/AVX
// - SEM alocação - Apenas strings literais
// - Serial sempre; ERROR/WARN/INFO também vão para os consoles registrados
// - `quiet` na linha de comando silencia apenas a cópia para os consoles
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada operação)
//
// FEATURES:
// - no_logs:   Remove 100% dos logs (custo zero no binário)
// - log_error: Apenas ERROR, WARN
// - log_info:  Apenas ERROR, WARN, INFO
// - log_trace: Todos os níveis (padrão)
//
// COMO USAR (NOVA SINTAXE):
//
// ANTES (antigo - NÃO usar):
//   kinfo!("Valor: {:#x}", some_value);
//
// DEPOIS (novo - usar):
//   kinfo!("(PMM) Inicializando...");          // Apenas string
//   kinfo!("(PMM) Addr=", 0x1000);             // String + hex
//   kinfo!("(VFS) Montando ", str path);         // String + &str
//   klog!("Valor=", addr, " Size=", size);     // Múltiplos valores
//
// =============================================================================

use crate::drivers::{console, serial};
use core::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);

/// Ativa/desativa o modo silencioso (opção `quiet` da cmdline).
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

#[inline]
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

// =============================================================================
// SINKS
// =============================================================================
//
// `console == true` replica a saída nos consoles registrados (line-buffered).
//

#[inline]
pub fn out_str(console: bool, s: &str) {
    serial::emit_str(s);
    if console && !is_quiet() {
        console::log_write(s.as_bytes());
    }
}

#[inline]
pub fn out_hex(console: bool, value: u64) {
    serial::emit_hex(value);
    if console && !is_quiet() {
        let mut buf = [0u8; 18];
        console::log_write(format_hex(value, &mut buf));
    }
}

#[inline]
pub fn out_nl(console: bool) {
    serial::emit_nl();
    if console && !is_quiet() {
        console::log_write(b"\n");
    }
}

/// Formata `0x%016X` sem core::fmt.
pub fn format_hex(value: u64, buf: &mut [u8; 18]) -> &[u8] {
    buf[0] = b'0';
    buf[1] = b'x';
    for i in 0..16 {
        let nibble = ((value >> (60 - i * 4)) & 0xF) as u8;
        buf[2 + i] = if nibble < 10 { b'0' + nibble } else { b'A' + nibble - 10 };
    }
    &buf[..]
}

// =============================================================================
// PREFIXOS COM CORES ANSI
// =============================================================================
//
// Cores ANSI para terminais que suportam (como o QEMU serial console).
// Cada prefixo inclui: código de cor + texto + reset de cor.
//
// Formato: \x1b[<código>m  onde:
//   1;31 = Bold Red
//   1;33 = Bold Yellow
//   32   = Green
//   36   = Cyan
//   35   = Magenta
//   0    = Reset
//

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================
//
// kerror! - Sempre ativo (exceto com no_logs)
// Usado para erros críticos que podem causar crash.
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    // String + texto
    ($msg:expr, str $s:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_ERROR);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_str(true, $s);
        $crate::core::logging::out_nl(true);
    }};
    // Apenas string literal
    ($msg:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_ERROR);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_nl(true);
    }};
    // String + valor hex
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_ERROR);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_hex(true, $val as u64);
        $crate::core::logging::out_nl(true);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================
//
// kwarn! - Ativo exceto com no_logs
// Usado para situações suspeitas mas recuperáveis.
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    // String + texto
    ($msg:expr, str $s:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_WARN);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_str(true, $s);
        $crate::core::logging::out_nl(true);
    }};
    // Apenas string literal
    ($msg:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_WARN);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_nl(true);
    }};
    // String + valor hex
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_WARN);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_hex(true, $val as u64);
        $crate::core::logging::out_nl(true);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================
//
// kinfo! - Ativo exceto com no_logs ou log_error
// Usado para eventos importantes do fluxo normal.
//

#[cfg(not(any(feature = "no_logs", feature = "log_error")))]
#[macro_export]
macro_rules! kinfo {
    // String + texto
    ($msg:expr, str $s:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_INFO);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_str(true, $s);
        $crate::core::logging::out_nl(true);
    }};
    // Apenas string literal
    ($msg:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_INFO);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_nl(true);
    }};
    // String + valor hex
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::out_str(true, $crate::core::logging::P_INFO);
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_hex(true, $val as u64);
        $crate::core::logging::out_nl(true);
    }};
}

#[cfg(any(feature = "no_logs", feature = "log_error"))]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================
//
// kdebug! - Ativo apenas com log_trace ou log_debug
// Usado para informações de debugging.
//

#[cfg(any(feature = "log_trace", feature = "log_debug"))]
#[macro_export]
macro_rules! kdebug {
    // String + texto
    ($msg:expr, str $s:expr) => {{
        $crate::core::logging::out_str(false, $crate::core::logging::P_DEBUG);
        $crate::core::logging::out_str(false, $msg);
        $crate::core::logging::out_str(false, $s);
        $crate::core::logging::out_nl(false);
    }};
    // Apenas string literal
    ($msg:expr) => {{
        $crate::core::logging::out_str(false, $crate::core::logging::P_DEBUG);
        $crate::core::logging::out_str(false, $msg);
        $crate::core::logging::out_nl(false);
    }};
    // String + valor hex
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::out_str(false, $crate::core::logging::P_DEBUG);
        $crate::core::logging::out_str(false, $msg);
        $crate::core::logging::out_hex(false, $val as u64);
        $crate::core::logging::out_nl(false);
    }};
}

#[cfg(not(any(feature = "log_trace", feature = "log_debug")))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================
//
// ktrace! - Ativo apenas com log_trace
// Usado para detalhes extremos de cada operação.
//

#[cfg(feature = "log_trace")]
#[macro_export]
macro_rules! ktrace {
    // String + texto
    ($msg:expr, str $s:expr) => {{
        $crate::core::logging::out_str(false, $crate::core::logging::P_TRACE);
        $crate::core::logging::out_str(false, $msg);
        $crate::core::logging::out_str(false, $s);
        $crate::core::logging::out_nl(false);
    }};
    // Apenas string literal
    ($msg:expr) => {{
        $crate::core::logging::out_str(false, $crate::core::logging::P_TRACE);
        $crate::core::logging::out_str(false, $msg);
        $crate::core::logging::out_nl(false);
    }};
    // String + valor hex
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::out_str(false, $crate::core::logging::P_TRACE);
        $crate::core::logging::out_str(false, $msg);
        $crate::core::logging::out_hex(false, $val as u64);
        $crate::core::logging::out_nl(false);
    }};
}

#[cfg(not(feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS AUXILIARES
// =============================================================================

/// klog! - Log genérico sem prefixo de nível.
///
/// Útil para construir logs complexos com múltiplos valores.
///
/// # Uso
/// ```rust
/// klog!("Addr=", addr);                    // String + hex
/// klog!("Start=", start, " End=", end);    // Múltiplos
/// ```
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! klog {
    // String + texto
    ($msg:expr, str $s:expr) => {{
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_str($s);
    }};
    // Apenas string
    ($msg:expr) => {{
        $crate::drivers::serial::emit_str($msg);
    }};
    // String + hex
    ($msg:expr, $val:expr) => {{
        $crate::drivers::serial::emit_str($msg);
        $crate::drivers::serial::emit_hex($val as u64);
    }};
    // String + hex + string
    ($msg1:expr, $val:expr, $msg2:expr) => {{
        $crate::drivers::serial::emit_str($msg1);
        $crate::drivers::serial::emit_hex($val as u64);
        $crate::drivers::serial::emit_str($msg2);
    }};
    // String + hex + string + hex
    ($msg1:expr, $val1:expr, $msg2:expr, $val2:expr) => {{
        $crate::drivers::serial::emit_str($msg1);
        $crate::drivers::serial::emit_hex($val1 as u64);
        $crate::drivers::serial::emit_str($msg2);
        $crate::drivers::serial::emit_hex($val2 as u64);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! klog {
    ($($t:tt)*) => {{}};
}

/// knl! - Emite apenas newline.
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! knl {
    () => {{
        $crate::drivers::serial::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! knl {
    () => {{}};
}

// =============================================================================
// MACROS DE STATUS (OK/FAIL)
// =============================================================================

/// kok! - Log de sucesso (prefixo verde [OK]).
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kok {
    ($msg:expr) => {{
        $crate::core::logging::out_str(true, "\x1b[32m[OK]\x1b[0m ");
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_nl(true);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kok {
    ($($t:tt)*) => {{}};
}

/// kfail! - Log de falha (prefixo vermelho [FAIL]).
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kfail {
    ($msg:expr) => {{
        $crate::core::logging::out_str(true, "\x1b[1;31m[FAIL]\x1b[0m ");
        $crate::core::logging::out_str(true, $msg);
        $crate::core::logging::out_nl(true);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kfail {
    ($($t:tt)*) => {{}};
}
