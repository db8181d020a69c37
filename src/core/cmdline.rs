//! Linha de comando do kernel.
//!
//! Opções separadas por espaço, na forma `nome` ou `nome=arg`. Aspas duplas agrupam
//! palavras (`init="/bin/sh -x"`) e são removidas do argumento.
//!
//! Opções reconhecidas:
//! - `init=<path>`          programa inicial (padrão `/programs/init`)
//! - `quiet`                não replica logs nos consoles
//! - `poweroff_on_panic`    desliga a máquina em vez de travar
//! - `scheduler=<nome>`     política de escalonamento (`naive`)

use alloc::string::{String, ToString};
use spin::Once;

pub const DEFAULT_INIT_PATH: &str = "/programs/init";

/// Uma opção já separada em nome e argumento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdlineOption<'a> {
    pub name: &'a str,
    pub arg: Option<&'a str>,
}

impl<'a> CmdlineOption<'a> {
    /// Interpreta o argumento como booleano; sem argumento vale `true`.
    pub fn as_bool(&self) -> Option<bool> {
        match self.arg {
            None => Some(true),
            Some(arg) => parse_bool(arg),
        }
    }
}

/// Iterador sobre as opções de uma linha de comando.
pub struct Options<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Options<'a> {
    type Item = CmdlineOption<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.rest.trim_start();
        if text.is_empty() {
            self.rest = text;
            return None;
        }

        let mut in_quote = false;
        let mut end = text.len();
        for (i, c) in text.char_indices() {
            match c {
                '"' => in_quote = !in_quote,
                c if c.is_whitespace() && !in_quote => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }

        let token = &text[..end];
        self.rest = &text[end..];

        Some(match token.split_once('=') {
            Some((name, arg)) => CmdlineOption { name: unquote(name), arg: Some(unquote(arg)) },
            None => CmdlineOption { name: unquote(token), arg: None },
        })
    }
}

fn unquote(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Separa `cmdline` em opções.
pub fn options(cmdline: &str) -> Options<'_> {
    Options { rest: cmdline }
}

/// `true/1/yes/on` e `false/0/no/off`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuração de boot derivada da linha de comando.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelOptions {
    pub init_path: String,
    pub quiet: bool,
    pub poweroff_on_panic: bool,
    pub scheduler: String,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            init_path: DEFAULT_INIT_PATH.to_string(),
            quiet: false,
            poweroff_on_panic: false,
            scheduler: "naive".to_string(),
        }
    }
}

impl KernelOptions {
    pub fn parse(cmdline: &str) -> Self {
        let mut opts = KernelOptions::default();

        for opt in options(cmdline) {
            match opt.name {
                "init" => match opt.arg {
                    Some(path) if !path.is_empty() => opts.init_path = path.to_string(),
                    _ => crate::kwarn!("(Cmdline) init= sem caminho, mantendo ", str DEFAULT_INIT_PATH),
                },
                "quiet" => opts.quiet = flag(&opt),
                "poweroff_on_panic" => opts.poweroff_on_panic = flag(&opt),
                "scheduler" => {
                    if let Some(name) = opt.arg {
                        opts.scheduler = name.to_string();
                    }
                }
                _ => crate::kdebug!("(Cmdline) opção ignorada: ", str opt.name),
            }
        }
        opts
    }
}

fn flag(opt: &CmdlineOption<'_>) -> bool {
    match opt.as_bool() {
        Some(value) => value,
        None => {
            crate::kwarn!("(Cmdline) valor booleano inválido para ", str opt.name);
            false
        }
    }
}

static CMDLINE: Once<String> = Once::new();
static OPTIONS: Once<KernelOptions> = Once::new();

/// Registra a linha de comando do boot e aplica as opções globais.
pub fn init(cmdline: &str) {
    let raw = CMDLINE.call_once(|| cmdline.to_string());
    let opts = OPTIONS.call_once(|| KernelOptions::parse(raw));
    crate::core::logging::set_quiet(opts.quiet);
    crate::kinfo!("(Cmdline) ", str raw.as_str());
}

/// Linha de comando completa (exportada em `/sys/kernel/bootargs`).
pub fn raw() -> &'static str {
    CMDLINE.get().map(|s| s.as_str()).unwrap_or("")
}

/// Opções do boot (padrões se `init` ainda não rodou).
pub fn kernel_options() -> KernelOptions {
    OPTIONS.get().cloned().unwrap_or_default()
}
