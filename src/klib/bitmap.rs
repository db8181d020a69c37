//! Bitmap genérico

/// Bitmap para gerenciamento de bits
pub struct Bitmap<'a> {
    data: &'a mut [u64],
    len: usize,
}

impl<'a> Bitmap<'a> {
    /// Cria bitmap sobre slice existente
    pub fn new(data: &'a mut [u64], bits: usize) -> Self {
        debug_assert!(bits <= data.len() * 64);
        Self { data, len: bits }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Define um bit
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.data[index / 64] |= 1 << (index % 64);
    }

    /// Limpa um bit
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < self.len);
        self.data[index / 64] &= !(1 << (index % 64));
    }

    /// Testa um bit
    pub fn test(&self, index: usize) -> bool {
        debug_assert!(index < self.len);
        (self.data[index / 64] & (1 << (index % 64))) != 0
    }

    /// Define `count` bits a partir de `start`.
    pub fn set_range(&mut self, start: usize, count: usize) {
        for i in start..start + count {
            self.set(i);
        }
    }

    /// Limpa `count` bits a partir de `start`.
    pub fn clear_range(&mut self, start: usize, count: usize) {
        for i in start..start + count {
            self.clear(i);
        }
    }

    /// Verdadeiro se nenhum bit estiver setado.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&w| w == 0)
    }

    /// Encontra primeiro bit livre (0)
    pub fn find_first_zero(&self) -> Option<usize> {
        for (i, &word) in self.data.iter().enumerate() {
            if word != u64::MAX {
                let index = i * 64 + word.trailing_ones() as usize;
                if index < self.len {
                    return Some(index);
                }
            }
        }
        None
    }

    /// Encontra o primeiro bit setado a partir de `from`.
    pub fn find_next_set(&self, from: usize) -> Option<usize> {
        (from..self.len).find(|&i| self.test(i))
    }
}
