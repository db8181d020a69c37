//! Contexto de registradores salvo na entrada de uma trap.
//!
//! O scheduler, o fork e a entrega de sinais manipulam o contexto só por aqui.

pub trait UserContext: Clone + Default + Send {
    /// Contexto inicial de uma thread de usuário.
    fn new_user(entry: usize, stack_top: usize, arg0: usize, arg1: usize) -> Self;

    fn ip(&self) -> usize;
    fn set_ip(&mut self, ip: usize);

    fn sp(&self) -> usize;
    fn set_sp(&mut self, sp: usize);

    /// Número da syscall (rax / a7).
    fn syscall_number(&self) -> usize;
    /// Argumento `index` (0..6) da syscall.
    fn syscall_arg(&self, index: usize) -> usize;

    /// Registrador de retorno (rax / a0).
    fn set_return(&mut self, value: isize);
    fn return_value(&self) -> isize;

    /// Argumento `index` de uma chamada de função (handler de sinal).
    fn set_call_arg(&mut self, index: usize, value: usize);

    /// Endereço de retorno de uma chamada de função (restorer do sinal).
    /// Em x86 é empilhado pelo chamador; aqui devolve `false` nesse caso.
    fn set_return_address(&mut self, ra: usize) -> bool;

    /// Prepara a reexecução da syscall `number` (restart de SA_RESTART): volta o ip
    /// para a instrução de trap e restaura o que o valor de retorno sobrescreveu.
    fn rewind_syscall(&mut self, number: usize, arg0: usize);

    /// Veio do modo usuário?
    fn from_user(&self) -> bool;

    /// Força modo usuário e descarta bits privilegiados de um contexto que passou
    /// pela memória de usuário (sigreturn).
    fn sanitize_user(&mut self);
}
