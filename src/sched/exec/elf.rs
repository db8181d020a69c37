//! Carregador ELF64.
//!
//! Cada PT_LOAD vira uma região privada: as páginas com bytes do arquivo são
//! mapeadas sob demanda do inode (copy-on-write na escrita) e o resto do `.bss`
//! vira uma região anônima.

use crate::fs::vfs::Inode;
use crate::mm::config::PAGE_SIZE;
use crate::mm::{mmap, Backing, ForkMode, MmError, PageSource, VmFlags, VmapContent};
use crate::mm::AddressSpace;
use crate::sched::{TaskError, TaskResult};
use crate::klib::{align_down, align_up};
use alloc::sync::Arc;
use alloc::vec;
use xmas_elf::header::{self, HeaderPt2, Machine};
use xmas_elf::program::{self, ProgramHeader};
use xmas_elf::ElfFile;

/// Maior executável aceito.
const MAX_IMAGE_SIZE: usize = 64 * 1024 * 1024;

#[cfg(target_arch = "riscv64")]
const MACHINE: Machine = Machine::RISC_V;
#[cfg(not(target_arch = "riscv64"))]
const MACHINE: Machine = Machine::X86_64;

/// Resultado da carga.
#[derive(Debug, Clone, Copy)]
pub struct LoadedElf {
    pub entry: usize,
    /// Primeiro byte depois do segmento mais alto.
    pub end: usize,
    /// Endereço dos program headers na imagem (0 se não estão mapeados).
    pub phdr: usize,
    pub phent: usize,
    pub phnum: usize,
}

fn segment_flags(ph: &ProgramHeader<'_>) -> VmFlags {
    let flags = ph.flags();
    let mut vm = VmFlags::USER;
    if flags.is_read() {
        vm |= VmFlags::READ;
    }
    if flags.is_write() {
        vm |= VmFlags::READ | VmFlags::WRITE;
    }
    if flags.is_execute() {
        vm |= VmFlags::READ | VmFlags::EXEC;
    }
    vm
}

/// Lê o executável inteiro e mapeia seus segmentos em `aspace`.
pub fn load(aspace: &AddressSpace, inode: &Arc<Inode>) -> TaskResult<LoadedElf> {
    let size = inode.size();
    if size == 0 || size > MAX_IMAGE_SIZE {
        return Err(TaskError::BadExecutable);
    }
    let mut data = vec![0u8; size];
    let read = inode.read_at(0, &mut data)?;
    data.truncate(read);

    let elf = ElfFile::new(&data).map_err(|_| TaskError::BadExecutable)?;
    let (entry, ph_offset, phent, phnum) = match elf.header.pt2 {
        HeaderPt2::Header64(pt2)
            if pt2.type_.as_type() == header::Type::Executable && pt2.machine.as_machine() == MACHINE =>
        {
            (pt2.entry_point as usize, pt2.ph_offset as usize, pt2.ph_entry_size as usize, pt2.ph_count as usize)
        }
        _ => return Err(TaskError::BadExecutable),
    };

    let source: Arc<dyn PageSource> = inode.clone();
    let mut end = 0;
    let mut phdr = 0;

    for ph in elf.program_iter() {
        if !matches!(ph.get_type(), Ok(program::Type::Load)) {
            continue;
        }
        let vaddr = ph.virtual_addr() as usize;
        let offset = ph.offset() as usize;
        let file_size = ph.file_size() as usize;
        let mem_size = ph.mem_size() as usize;
        if mem_size == 0 {
            continue;
        }
        if vaddr % PAGE_SIZE != offset % PAGE_SIZE || file_size > mem_size || offset + file_size > data.len() {
            crate::kdebug!("(Exec) Segmento PT_LOAD inválido em ", vaddr);
            return Err(TaskError::BadExecutable);
        }

        let flags = segment_flags(&ph);
        let content = if flags.contains(VmFlags::EXEC) { VmapContent::Code } else { VmapContent::Data };
        let page_start = align_down(vaddr, PAGE_SIZE);
        let seg_end = align_up(vaddr + mem_size, PAGE_SIZE);
        let head = vaddr - page_start;

        // Páginas com conteúdo do arquivo.
        let file_len = if file_size == 0 { 0 } else { head + file_size };
        let file_pages = crate::klib::div_round_up(file_len, PAGE_SIZE);
        if file_pages > 0 {
            let backing = Backing::File { source: source.clone(), offset: offset - head, len: file_len };
            mmap::map_region(aspace, page_start, file_pages, flags, content, ForkMode::Private, backing)?;
        }

        // Resto do .bss.
        let bss_start = page_start + file_pages * PAGE_SIZE;
        if seg_end > bss_start {
            let npages = (seg_end - bss_start) / PAGE_SIZE;
            mmap::map_region(aspace, bss_start, npages, flags, VmapContent::Data, ForkMode::Private, Backing::Anonymous)?;
        }

        if offset <= ph_offset && ph_offset < offset + file_size {
            phdr = vaddr + (ph_offset - offset);
        }
        end = end.max(seg_end);
    }

    if end == 0 {
        return Err(TaskError::Memory(MmError::InvalidSize));
    }
    crate::kdebug!("(Exec) Imagem carregada, entrada=", entry);
    Ok(LoadedElf { entry, end, phdr, phent, phnum })
}
