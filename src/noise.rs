//! Removes small artefacts from binary change masks.

use crate::error::Result;
use crate::raster::BinaryImage;


/// Remove every 4-connected foreground region smaller than `min_size` pixels.
///
/// Regions with at least `min_size` pixels are left untouched. The input has to be binary
/// (0 and 255 only).
pub fn remove_noise(binary: &BinaryImage, min_size: usize) -> Result<BinaryImage> {
    binary.check_binary()?;

    let width = binary.width() as usize;
    let height = binary.height() as usize;
    let mut keep: Vec<bool> = binary.data()
        .iter()
        .map(|&v| v == BinaryImage::FOREGROUND)
        .collect();

    let mut visited = vec![false; keep.len()];
    let mut component = vec![];
    let mut stack = vec![];

    for start in 0..keep.len() {
        if !keep[start] || visited[start] {
            continue;
        }

        component.clear();
        stack.push(start);
        visited[start] = true;

        while let Some(idx) = stack.pop() {
            component.push(idx);

            let (x, y) = (idx % width, idx / width);
            let mut visit = |n: usize| {
                if keep[n] && !visited[n] {
                    visited[n] = true;
                    stack.push(n);
                }
            };

            if x > 0 { visit(idx - 1); }
            if x + 1 < width { visit(idx + 1); }
            if y > 0 { visit(idx - width); }
            if y + 1 < height { visit(idx + width); }
        }

        if component.len() < min_size {
            for &idx in &component {
                keep[idx] = false;
            }
        }
    }

    Ok(BinaryImage::from_flags(binary.width(), binary.height(), &keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn from_rows(rows: &[&str]) -> BinaryImage {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let data = rows.iter()
            .flat_map(|r| r.chars())
            .map(|c| if c == '#' { 255.0 } else { 0.0 })
            .collect();
        BinaryImage::new(width, height, data).unwrap()
    }

    fn count(img: &BinaryImage) -> usize {
        img.data().iter().filter(|&&v| v == 255.0).count()
    }

    #[test]
    fn isolated_pixel_is_removed() {
        let img = from_rows(&[
            "....",
            ".#..",
            "....",
        ]);
        let out = remove_noise(&img, 2).unwrap();
        assert_eq!(count(&out), 0);
    }

    #[test]
    fn block_is_kept() {
        let img = from_rows(&[
            ".....",
            ".###.",
            ".###.",
            ".###.",
        ]);
        let out = remove_noise(&img, 5).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn diagonal_pixels_are_separate_regions() {
        let img = from_rows(&[
            "#...",
            ".#..",
            "..#.",
        ]);
        assert_eq!(count(&remove_noise(&img, 2).unwrap()), 0);

        let img = from_rows(&[
            "##..",
            ".##.",
            "..#.",
        ]);
        assert_eq!(count(&remove_noise(&img, 2).unwrap()), 5);
    }

    #[test]
    fn only_small_regions_go() {
        let img = from_rows(&[
            "##....#",
            "##.....",
            ".......",
            "....###",
        ]);
        let out = remove_noise(&img, 3).unwrap();
        assert_eq!(out, from_rows(&[
            "##.....",
            "##.....",
            ".......",
            "....###",
        ]));
    }

    #[test]
    fn region_of_exactly_min_size_stays() {
        let img = from_rows(&["###.#"]);
        assert_eq!(remove_noise(&img, 3).unwrap(), from_rows(&["###.."]));
    }

    #[test]
    fn min_size_of_one_keeps_everything() {
        let img = from_rows(&["#.#", ".#."]);
        assert_eq!(remove_noise(&img, 1).unwrap(), img);
        assert_eq!(remove_noise(&img, 0).unwrap(), img);
    }

    #[test]
    fn rejects_non_binary_input() {
        let img = BinaryImage::new(2, 1, vec![255.0, 1.0]).unwrap();
        assert!(matches!(remove_noise(&img, 2), Err(Error::NotBinary(_))));
    }
}
