//! Equal-area sky tessellation.
//!
//! [`Healpix`] implements the RING scheme: `12 * nside^2` cells of equal
//! area laid out on `4 * nside - 1` iso-latitude rings. Only what the
//! metric needs is here: cell count, cell area, cell centers and a disc
//! query.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Area of the full celestial sphere, in square degrees.
pub const FULL_SKY_DEG2: f64 = 41_252.961_249_419_27;

/// Radius of a visit's field of view, in degrees.
pub const FIELD_RADIUS_DEG: f64 = 1.75;

#[derive(Debug, thiserror::Error)]
pub enum SkyError {
    #[error("nside must be a positive power of two, got {0}")]
    InvalidNside(u32),

    #[error("nside {0} is too large")]
    NsideTooLarge(u32),
}

/// A partition of the sphere into equal-area cells.
pub trait Tessellation {
    fn cell_count(&self) -> usize;

    /// Area of one cell in square degrees.
    fn cell_area(&self) -> f64;

    /// Appends to `out` every cell whose center lies within `radius_deg` of
    /// the point (`ra_deg`, `dec_deg`). `out` is cleared first.
    fn cells_within(&self, ra_deg: f64, dec_deg: f64, radius_deg: f64, out: &mut Vec<usize>);
}

/// `HEALPix` tessellation in RING ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Healpix {
    nside: u32,
}

/// One iso-latitude ring.
#[derive(Debug, Clone, Copy)]
struct Ring {
    /// Index of the ring's first cell.
    first: usize,
    count: usize,
    z: f64,
    /// Longitude of the first cell center.
    phi0: f64,
    dphi: f64,
}

impl Healpix {
    // Keeps 12 * nside^2 well inside usize and f64's exact integer range.
    const MAX_NSIDE: u32 = 1 << 20;

    pub fn new(nside: u32) -> Result<Self, SkyError> {
        if nside == 0 || !nside.is_power_of_two() {
            return Err(SkyError::InvalidNside(nside));
        }
        if nside > Self::MAX_NSIDE {
            return Err(SkyError::NsideTooLarge(nside));
        }
        Ok(Self { nside })
    }

    pub fn nside(&self) -> u32 {
        self.nside
    }

    pub fn npix(&self) -> usize {
        let n = self.nside as usize;
        12 * n * n
    }

    fn ring_count(&self) -> usize {
        4 * self.nside as usize - 1
    }

    /// Ring `i`, numbered 1 at the north pole to `4 * nside - 1` at the south.
    #[allow(clippy::cast_precision_loss)]
    fn ring(&self, i: usize) -> Ring {
        let n = self.nside as usize;
        let nf = n as f64;
        let npix = self.npix();

        if i < n {
            let fi = i as f64;
            let count = 4 * i;
            Ring {
                first: 2 * i * (i - 1),
                count,
                z: 1.0 - fi * fi / (3.0 * nf * nf),
                phi0: PI / (4.0 * fi),
                dphi: PI / (2.0 * fi),
            }
        } else if i <= 3 * n {
            let shifted = (i + n) % 2 == 0;
            Ring {
                first: 2 * n * (n - 1) + (i - n) * 4 * n,
                count: 4 * n,
                z: 4.0 / 3.0 - 2.0 * i as f64 / (3.0 * nf),
                phi0: if shifted { PI / (4.0 * nf) } else { 0.0 },
                dphi: PI / (2.0 * nf),
            }
        } else {
            let mirror = self.ring(4 * n - i);
            Ring {
                first: npix - mirror.first - mirror.count,
                z: -mirror.z,
                ..mirror
            }
        }
    }

    /// Center of cell `pix` as (ra, dec) in degrees.
    #[cfg(test)]
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn center(&self, pix: usize) -> (f64, f64) {
        let ring = (1..=self.ring_count())
            .map(|i| self.ring(i))
            .find(|r| pix < r.first + r.count)
            .unwrap_or_else(|| self.ring(self.ring_count()));
        let k = pix.saturating_sub(ring.first) as f64;
        let phi = ring.phi0 + k * ring.dphi;
        (phi.to_degrees(), ring.z.asin().to_degrees())
    }
}

impl Tessellation for Healpix {
    fn cell_count(&self) -> usize {
        self.npix()
    }

    #[allow(clippy::cast_precision_loss)]
    fn cell_area(&self) -> f64 {
        FULL_SKY_DEG2 / self.npix() as f64
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn cells_within(&self, ra_deg: f64, dec_deg: f64, radius_deg: f64, out: &mut Vec<usize>) {
        out.clear();
        let theta0 = FRAC_PI_2 - dec_deg.to_radians();
        let phi0 = ra_deg.to_radians();
        let radius = radius_deg.to_radians();
        let cos_radius = radius.cos();
        let (sin_t0, cos_t0) = theta0.sin_cos();

        // Only rings whose colatitude falls inside the disc's band can hold
        // a matching center.
        let z_max = (theta0 - radius).max(0.0).cos();
        let z_min = (theta0 + radius).min(PI).cos();

        for i in 1..=self.ring_count() {
            let ring = self.ring(i);
            if ring.z > z_max || ring.z < z_min {
                continue;
            }
            let cos_t = ring.z;
            let sin_t = (1.0 - cos_t * cos_t).max(0.0).sqrt();

            // Longitude half-width of the disc at this ring.
            let denom = sin_t0 * sin_t;
            let half_width = if denom <= f64::EPSILON {
                PI
            } else {
                ((cos_radius - cos_t0 * cos_t) / denom).clamp(-1.0, 1.0).acos()
            };

            if half_width >= PI {
                out.extend(ring.first..ring.first + ring.count);
                continue;
            }

            // Candidate cells around the disc center's longitude, checked
            // exactly so rounding at the edges cannot admit extra cells.
            let offset = (phi0 - ring.phi0).rem_euclid(TAU);
            let lo = ((offset - half_width) / ring.dphi).floor() as i64 - 1;
            let hi = ((offset + half_width) / ring.dphi).ceil() as i64 + 1;
            let count = ring.count as i64;
            let span = (hi - lo + 1).min(count);
            for step in 0..span {
                let k = (lo + step).rem_euclid(count) as usize;
                let phi = ring.phi0 + k as f64 * ring.dphi;
                let cos_dist = cos_t0 * cos_t + sin_t0 * sin_t * (phi - phi0).cos();
                if cos_dist >= cos_radius {
                    out.push(ring.first + k);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
    }
}
