//! Reed-Solomon erasure coding of a ciphertext into equally sized fragments.

use std::collections::HashMap;

use crate::errors::TransportError;

/// Fragment length for `len` bytes split over `data_shards`; the coder requires an even, non-zero size.
pub fn fragment_size(len: usize, data_shards: usize) -> usize {
    let size = len.div_ceil(data_shards).max(2);
    size + size % 2
}

/// Splits `data` into `data_shards` originals followed by `parity_shards` recovery fragments.
pub fn encode(data: &[u8], data_shards: usize, parity_shards: usize) -> Result<Vec<Vec<u8>>, TransportError> {
    let size = fragment_size(data.len(), data_shards);
    let mut padded = data.to_vec();
    padded.resize(size * data_shards, 0);

    let originals: Vec<&[u8]> = padded.chunks(size).collect();
    let recovery = reed_solomon_simd::encode(data_shards, parity_shards, &originals)
        .map_err(|e| TransportError::Encoding(e.to_string()))?;

    let mut fragments: Vec<Vec<u8>> = originals.into_iter().map(<[u8]>::to_vec).collect();
    fragments.extend(recovery);
    Ok(fragments)
}

/// Rebuilds the first `len` bytes of the original data from any `data_shards`
/// distinct fragments. Indices below `data_shards` are originals.
pub fn reconstruct(
    fragments: &[(usize, &[u8])],
    data_shards: usize,
    parity_shards: usize,
    len: usize,
) -> Result<Vec<u8>, TransportError> {
    let mut originals: HashMap<usize, Vec<u8>> = HashMap::with_capacity(data_shards);
    let mut recovery = Vec::new();
    for &(index, fragment) in fragments {
        if index < data_shards {
            originals.insert(index, fragment.to_vec());
        } else if index < data_shards + parity_shards {
            recovery.push((index - data_shards, fragment));
        }
    }

    if originals.len() < data_shards {
        if originals.len() + recovery.len() < data_shards {
            return Err(TransportError::Reconstruction(format!(
                "need {} fragments, have {}",
                data_shards,
                originals.len() + recovery.len()
            )));
        }
        let restored = reed_solomon_simd::decode(
            data_shards,
            parity_shards,
            originals.iter().map(|(i, f)| (*i, f.as_slice())),
            recovery,
        )
        .map_err(|e| TransportError::Reconstruction(e.to_string()))?;
        originals.extend(restored);
    }

    let mut out = Vec::with_capacity(len);
    for index in 0..data_shards {
        let fragment = originals
            .get(&index)
            .ok_or_else(|| TransportError::Reconstruction(format!("fragment {index} not restored")))?;
        out.extend_from_slice(fragment);
    }
    if out.len() < len {
        return Err(TransportError::Reconstruction("declared length exceeds fragments".into()));
    }
    out.truncate(len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_size_is_even() {
        assert_eq!(fragment_size(0, 3), 2);
        assert_eq!(fragment_size(7, 3), 4);
        assert_eq!(fragment_size(9, 3), 4);
        assert_eq!(fragment_size(12, 3), 4);
    }

    #[test]
    fn test_recovers_from_parity_only() {
        let data: Vec<u8> = (0..=250u8).collect();
        let fragments = encode(&data, 3, 6).unwrap();
        assert_eq!(fragments.len(), 9);

        let parity: Vec<(usize, &[u8])> = fragments.iter().enumerate().skip(6).map(|(i, f)| (i, f.as_slice())).collect();
        assert_eq!(reconstruct(&parity, 3, 6, data.len()).unwrap(), data);
    }

    #[test]
    fn test_too_few_fragments() {
        let data = vec![42u8; 100];
        let fragments = encode(&data, 3, 6).unwrap();
        let two: Vec<(usize, &[u8])> = vec![(0, &fragments[0]), (5, &fragments[5])];
        assert!(matches!(reconstruct(&two, 3, 6, data.len()), Err(TransportError::Reconstruction(_))));
    }
}
