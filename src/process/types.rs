//! Process type definitions
//!
//! The process slot is the unit the rest of the kernel sees. Each slot is
//! also the "shared record" of a thread group: whichever LWP is mounted
//! lives here, every other LWP of the group keeps a private copy of this
//! structure inside its thread record.

/// Process ID type
pub type Pid = u32;

/// Maximum number of process slots
pub const NPROC: usize = 64;
/// Maximum number of CPUs driven by the scheduler
pub const NCPU: usize = 8;
/// Open files per process
pub const NOFILE: usize = 16;
/// Length of the debug name, including the terminating NUL
pub const PROC_NAME_LEN: usize = 16;

/// Process state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    Unused,
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

impl ProcessState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProcessState::Unused => "unused",
            ProcessState::Embryo => "embryo",
            ProcessState::Sleeping => "sleep ",
            ProcessState::Runnable => "runble",
            ProcessState::Running => "run   ",
            ProcessState::Zombie => "zombie",
        }
    }

    /// Dead entities are skipped and purged by both run queues.
    pub const fn is_dead(self) -> bool {
        matches!(self, ProcessState::Unused | ProcessState::Zombie)
    }
}

/// Callee-saved registers captured by the raw context switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Context {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub rsp: u64,
    pub rip: u64,
}

impl Context {
    pub const fn zero() -> Self {
        Self {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            rbx: 0,
            rbp: 0,
            rsp: 0,
            rip: 0,
        }
    }
}

/// User-mode register state restored on return from the kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// User instruction pointer
    pub rip: u64,
    /// User stack pointer
    pub rsp: u64,
    /// Syscall return register
    pub rax: u64,
    pub rflags: u64,
}

/// Kernel stack handed out by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelStack {
    pub base: u64,
    pub size: u64,
}

impl KernelStack {
    pub const fn top(&self) -> u64 {
        self.base + self.size
    }
}

/// Opaque handle of a user address space (page-table root).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressSpace(pub u64);

/// Opaque handle of an open file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileRef(pub usize);

/// Opaque handle of an inode (current working directory).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InodeRef(pub usize);

/// Token a sleeping LWP waits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitChannel {
    /// Parent blocked in `wait` on its own slot.
    Process(usize),
    /// LWPs blocked while another LWP of the slot runs exec.
    Exec(usize),
    /// Anything owned by other subsystems (pipes, disk buffers, ticks).
    External(usize),
}

/// Process slot
#[derive(Clone, Copy, Debug)]
pub struct Process {
    pub pid: Pid,
    /// Slot index of the parent
    pub parent: Option<usize>,
    pub state: ProcessState,
    pub killed: bool,
    pub chan: Option<WaitChannel>,
    pub kstack: Option<KernelStack>,
    pub context: Context,
    pub tf: TrapFrame,
    pub pgdir: Option<AddressSpace>,
    /// Size of user memory in bytes
    pub sz: u64,
    pub ofile: [Option<FileRef>; NOFILE],
    pub cwd: Option<InodeRef>,
    pub name: [u8; PROC_NAME_LEN],
}

impl Process {
    pub const fn empty() -> Self {
        Self {
            pid: 0,
            parent: None,
            state: ProcessState::Unused,
            killed: false,
            chan: None,
            kstack: None,
            context: Context::zero(),
            tf: TrapFrame {
                rip: 0,
                rsp: 0,
                rax: 0,
                rflags: 0,
            },
            pgdir: None,
            sz: 0,
            ofile: [None; NOFILE],
            cwd: None,
            name: [0; PROC_NAME_LEN],
        }
    }

    /// Copy `name` into the fixed buffer, truncating and NUL-terminating.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; PROC_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(PROC_NAME_LEN - 1);
        self.name[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(PROC_NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }
}

impl Default for Process {
    fn default() -> Self {
        Self::empty()
    }
}
