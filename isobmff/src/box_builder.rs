//! Generic length-prefixed ISO-BMFF box construction, used both by the
//! joiner's mdat-patch path and by tests that need to build fixture
//! boxes without hand-counting offsets.

/// Incrementally builds nested `size(u32) || fourcc(4) || payload` boxes.
/// `open_box` reserves the size field and pushes its offset; `close_box`
/// pops the most recently opened box and patches its size from the
/// current length.
pub trait IBoxBuilder {
    fn open_box(&mut self, fourcc: &[u8; 4]);
    fn write(&mut self, data: &[u8]);
    fn close_box(&mut self);
    fn finalize(self) -> Vec<u8>;
}

#[derive(Debug, Default)]
pub struct Mp4BoxBuilder {
    buf: Vec<u8>,
    open_offsets: Vec<usize>,
}

impl Mp4BoxBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IBoxBuilder for Mp4BoxBuilder {
    fn open_box(&mut self, fourcc: &[u8; 4]) {
        self.open_offsets.push(self.buf.len());
        self.buf.extend_from_slice(&0u32.to_be_bytes());
        self.buf.extend_from_slice(fourcc);
    }

    fn write(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn close_box(&mut self) {
        let Some(offset) = self.open_offsets.pop() else {
            return;
        };
        let size = (self.buf.len() - offset) as u32;
        self.buf[offset..offset + 4].copy_from_slice(&size.to_be_bytes());
    }

    fn finalize(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_boxes_get_correct_sizes() {
        let mut b = Mp4BoxBuilder::new();
        b.open_box(b"moof");
        b.open_box(b"mfhd");
        b.write(&[1, 2, 3, 4]);
        b.close_box();
        b.close_box();
        let out = b.finalize();

        let moof_size = u32::from_be_bytes(out[0..4].try_into().unwrap());
        assert_eq!(moof_size as usize, out.len());
        let mfhd_size = u32::from_be_bytes(out[8..12].try_into().unwrap());
        assert_eq!(mfhd_size as usize, out.len() - 8);
    }
}
