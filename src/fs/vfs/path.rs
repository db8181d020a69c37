//! Parsing de caminhos

use super::{FsError, FsResult};
use alloc::string::String;

/// Maior caminho aceito.
pub const MAX_PATH: usize = 4096;
/// Maior componente aceito.
pub const MAX_NAME: usize = 255;

/// Iterador sobre componentes de caminho. Barras repetidas não geram componentes
/// vazios.
pub struct PathComponents<'a> {
    remaining: &'a str,
}

impl<'a> PathComponents<'a> {
    pub fn new(path: &'a str) -> Self {
        Self { remaining: path }
    }
}

impl<'a> Iterator for PathComponents<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining.is_empty() {
                return None;
            }
            let (component, rest) = match self.remaining.find('/') {
                Some(pos) => (&self.remaining[..pos], &self.remaining[pos + 1..]),
                None => (self.remaining, ""),
            };
            self.remaining = rest;
            if !component.is_empty() {
                return Some(component);
            }
        }
    }
}

/// Verifica se caminho é absoluto
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// `a/b/` pede um diretório no último componente.
pub fn has_trailing_slash(path: &str) -> bool {
    path.ends_with('/') && !path.trim_end_matches('/').is_empty()
}

/// Rejeita caminhos longos demais ou com componentes longos demais.
pub fn validate(path: &str) -> FsResult<()> {
    if path.len() > MAX_PATH {
        return Err(FsError::NameTooLong);
    }
    if path.contains('\0') {
        return Err(FsError::InvalidArgument);
    }
    if PathComponents::new(path).any(|c| c.len() > MAX_NAME) {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

/// Monta `/a/b/c` a partir dos componentes.
pub fn join<'a, I: IntoIterator<Item = &'a str>>(components: I) -> String {
    let mut result = String::new();
    for component in components {
        result.push('/');
        result.push_str(component);
    }
    if result.is_empty() {
        result.push('/');
    }
    result
}
