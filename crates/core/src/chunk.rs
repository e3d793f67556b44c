//! Multipart chunk planning.

/// One part of a multipart upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    /// 1-based part number, as used by S3-style multipart uploads.
    pub part_number: u32,
    /// Byte offset of the part within the blob.
    pub offset: u64,
    /// Length of the part in bytes.
    pub len: u64,
}

/// Iterator over the parts of a blob of `size` bytes split into `chunk_size`
/// pieces. Every part is `chunk_size` long except possibly the last.
#[derive(Clone, Debug)]
pub struct Chunks {
    size: u64,
    chunk_size: u64,
    offset: u64,
    part_number: u32,
}

/// Plan the parts for a blob.
///
/// A zero `chunk_size` is treated as "one part covering everything".
pub fn chunks(size: u64, chunk_size: u64) -> Chunks {
    let chunk_size = if chunk_size == 0 {
        size.max(1)
    } else {
        chunk_size
    };
    Chunks {
        size,
        chunk_size,
        offset: 0,
        part_number: 0,
    }
}

impl Iterator for Chunks {
    type Item = ChunkPlan;

    fn next(&mut self) -> Option<ChunkPlan> {
        if self.offset >= self.size {
            return None;
        }
        let len = self.chunk_size.min(self.size - self.offset);
        self.part_number += 1;
        let plan = ChunkPlan {
            part_number: self.part_number,
            offset: self.offset,
            len,
        };
        self.offset += len;
        Some(plan)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.size - self.offset).div_ceil(self.chunk_size);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}
