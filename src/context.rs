/*
 * Context Primitive (C2, external)
 *
 * Everything in this module is the "black box" the rest of the runtime is
 * written against: save/restore of callee-saved registers and the stack
 * pointer, and bootstrapping a fresh stack so that swapping into it for the
 * first time lands in `trampoline`. None of the scheduling policy lives
 * here -- this is pure register plumbing, the systems-programming
 * equivalent of `<ucontext.h>`'s `makecontext`/`swapcontext` pair that the
 * library's pedigree is named after.
 *
 * Only x86_64 System V is implemented. Porting to another ABI means adding
 * another `raw_switch` body and another `RawContext` field layout; nothing
 * outside this file needs to change.
 */

use std::arch::global_asm;

/// Saved callee-saved registers plus the stack pointer.
///
/// Field order matches the offsets `raw_switch` below reads and writes;
/// changing one without the other corrupts every thread in the system.
#[repr(C)]
#[derive(Debug, Default)]
pub struct RawContext {
    rsp: u64,
    r15: u64,
    r14: u64,
    r13: u64,
    r12: u64,
    rbx: u64,
    rbp: u64,
}

#[cfg(target_arch = "x86_64")]
global_asm!(
    r#"
.text
.global uthreads_raw_switch
uthreads_raw_switch:
    mov [rdi + 0x00], rsp
    mov [rdi + 0x08], r15
    mov [rdi + 0x10], r14
    mov [rdi + 0x18], r13
    mov [rdi + 0x20], r12
    mov [rdi + 0x28], rbx
    mov [rdi + 0x30], rbp

    mov rsp, [rsi + 0x00]
    mov r15, [rsi + 0x08]
    mov r14, [rsi + 0x10]
    mov r13, [rsi + 0x18]
    mov r12, [rsi + 0x20]
    mov rbx, [rsi + 0x28]
    mov rbp, [rsi + 0x30]
    ret
"#
);

#[cfg(target_arch = "x86_64")]
extern "C" {
    /// Save the currently executing register state into `*old`, then load
    /// and jump into the state saved in `*new`.
    ///
    /// Returns (by a later, unrelated call to `uthreads_raw_switch` writing
    /// `old` again) when some other thread swaps back into `old`.
    fn uthreads_raw_switch(old: *mut RawContext, new: *const RawContext);
}

/// Initialize `ctx` so that the next [`swap`] into it begins executing
/// `trampoline` on `stack`.
///
/// `trampoline` must never return; it is reached via a bare `ret`
/// instruction rather than a `call`, so there is nothing to return *to*.
/// The thread's actual entry closure is not threaded through registers --
/// `trampoline` looks it up by consulting the current-thread id, which the
/// scheduler sets before ever swapping into a freshly made context (see
/// runtime.rs). This sidesteps needing to pass `arg1`/`arg2` through
/// registers entirely.
///
/// # Safety
/// `stack` must remain live and untouched for as long as `ctx` might still
/// be swapped into, and must be large enough to hold whatever `trampoline`
/// and the thread body actually use.
pub unsafe fn make_context(ctx: &mut RawContext, stack: &mut [u8], trampoline: extern "C" fn() -> !) {
    assert!(stack.len() >= 64, "stack too small to bootstrap a context");

    // Land 16-byte aligned, then reserve one slot for the "return address"
    // the final `ret` in raw_switch will pop. After that pop, rsp % 16 == 8,
    // matching the alignment the SysV ABI expects on entry to a function
    // reached via `call` -- `trampoline` never knows it was reached via a
    // bare jump instead.
    let top = stack.as_mut_ptr().add(stack.len());
    let aligned = (top as usize & !0xf) as *mut u8;
    let entry_slot = aligned.sub(16) as *mut u64;
    unsafe {
        entry_slot.write(trampoline as usize as u64);
    }

    *ctx = RawContext {
        rsp: entry_slot as u64,
        r15: 0,
        r14: 0,
        r13: 0,
        r12: 0,
        rbx: 0,
        rbp: 0,
    };
}

/// Save the caller's register state into `old`, then resume `new`.
///
/// Returns once some later call to `swap` targets `old` again. Caller must
/// not hold any borrow of shared runtime state across this call -- by the
/// time this function returns, an arbitrary number of other logical threads
/// may have run and mutated that state.
///
/// # Safety
/// `old` and `new` must be the live contexts of, respectively, the
/// currently-running thread and a thread this runtime has previously
/// initialized via [`make_context`] or which has itself previously called
/// `swap` with itself as `old`.
pub unsafe fn swap(old: *mut RawContext, new: *const RawContext) {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        uthreads_raw_switch(old, new);
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = (old, new);
        compile_error!("uthreads: context switching is only implemented for x86_64");
    }
}
