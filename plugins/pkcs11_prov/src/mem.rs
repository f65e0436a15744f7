// Copyright (C) Microsoft Corporation. All rights reserved.

//! Fallible allocation of buffers that hold key material.

use zeroize::Zeroizing;

use crate::error::ProvErrorMapper;
use crate::ProvError;
use crate::ProvResult;

/// Allocates `len` zero bytes, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc_zeroed(len: usize) -> ProvResult<Zeroizing<Vec<u8>>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_prov_err(ProvError::AllocationFailed)?;
    buf.resize(len, 0);
    Ok(Zeroizing::new(buf))
}

/// Copies `bytes` into a newly owned buffer.
pub(crate) fn try_copy(bytes: &[u8]) -> ProvResult<Zeroizing<Vec<u8>>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len()).map_prov_err(ProvError::AllocationFailed)?;
    buf.extend_from_slice(bytes);
    Ok(Zeroizing::new(buf))
}

#[cfg(test)]
mod tests {
    use test_with_tracing::test;

    use super::*;

    #[test]
    fn test_alloc_zeroed() {
        let buf = try_alloc_zeroed(17).expect("allocation failed");
        assert_eq!(buf.len(), 17);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_alloc_overflow_is_reported() {
        assert_eq!(
            try_alloc_zeroed(usize::MAX).err(),
            Some(ProvError::AllocationFailed)
        );
    }

    #[test]
    fn test_copy_is_independent() {
        let mut src = vec![1u8, 2, 3];
        let copy = try_copy(&src).expect("copy failed");
        src[0] = 9;
        assert_eq!(copy.as_slice(), &[1, 2, 3]);
    }
}
