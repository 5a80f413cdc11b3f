/// Runtime-support routine guarding integer division and remainder.
pub const DIV_ZERO_CHECK_FN_NAME: &str = "hy_div_zero_check";

/// Runtime-support routine guarding shift amounts.
pub const OVERSHIFT_CHECK_FN_NAME: &str = "hy_overshift_check";

/// Allocator shims provided by the runtime-support library.
pub const ALLOCATOR_SHIM_FN_NAMES: [&str; 4] = [
    "__rust_alloc",
    "__rust_dealloc",
    "__rust_realloc",
    "__rust_alloc_zeroed",
];

/// Declarations the interpreter services natively; they never need a definition.
pub const SPECIAL_FUNCTIONS: &[&str] = &[
    "abort",
    "exit",
    "_exit",
    "malloc",
    "calloc",
    "realloc",
    "free",
    "memcpy",
    "memmove",
    "memset",
    "hy_assume",
    "hy_assert",
    "hy_make_symbolic",
    "hy_report_error",
    "hy_silent_exit",
];

/// Textual form of the prepared module.
pub const ASSEMBLY_FILE_NAME: &str = "assembly.hy";

/// Binary form of the prepared module.
pub const MODULE_FILE_NAME: &str = "final.hybc";

/// Runtime-support libraries, relative to the configured library directory.
pub const INTRINSIC_LIB_NAME: &str = "libhyintrinsic.hybc";
pub const FP_RUNTIME_LIB_NAME: &str = "libhyfp.hybc";
pub const POSIX_RUNTIME_LIB_NAME: &str = "libhyposix.hybc";

/// Names of runtime-support routines excluded from coverage and statistics,
/// given the enabled guard checks. Names absent from a program are ignored.
pub fn internal_function_names(check_div_zero: bool, check_overshift: bool) -> Vec<&'static str> {
    let mut names = Vec::with_capacity(ALLOCATOR_SHIM_FN_NAMES.len() + 2);
    if check_div_zero {
        names.push(DIV_ZERO_CHECK_FN_NAME);
    }
    if check_overshift {
        names.push(OVERSHIFT_CHECK_FN_NAME);
    }
    names.extend(ALLOCATOR_SHIM_FN_NAMES);
    names
}
