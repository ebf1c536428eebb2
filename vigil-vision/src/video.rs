use anyhow::{Context, Result};
use image::RgbImage;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

/// Pixel layouts the camera may hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb3,
    Yuyv,
    Grey,
    Other(FourCC),
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Self {
        match &fourcc.repr {
            b"RGB3" => Self::Rgb3,
            b"YUYV" => Self::Yuyv,
            b"GREY" => Self::Grey,
            _ => Self::Other(fourcc),
        }
    }

    /// Convert one raw buffer to packed RGB of `width` x `height`.
    pub fn to_rgb(self, width: u32, height: u32, data: &[u8]) -> Result<RgbImage> {
        let pixels = (width * height) as usize;
        let buf = match self {
            Self::Rgb3 => {
                if data.len() < pixels * 3 {
                    anyhow::bail!("short RGB3 buffer: {} < {}", data.len(), pixels * 3);
                }
                data[..pixels * 3].to_vec()
            }
            Self::Yuyv => yuyv_to_rgb(pixels, data)?,
            Self::Grey => {
                if data.len() < pixels {
                    anyhow::bail!("short GREY buffer: {} < {}", data.len(), pixels);
                }
                data[..pixels].iter().flat_map(|&y| [y, y, y]).collect()
            }
            Self::Other(fourcc) => anyhow::bail!("unsupported pixel format {:?}", fourcc),
        };
        RgbImage::from_raw(width, height, buf)
            .ok_or_else(|| anyhow::anyhow!("failed to build {}x{} frame", width, height))
    }
}

/// V4L2 capture device.
pub struct Camera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Camera {
    pub fn open(device: &str) -> Result<Self> {
        let dev = Device::with_path(device).with_context(|| format!("open camera {}", device))?;
        let mut fmt = dev.format().context("get format")?;

        // Prefer RGB, then YUYV, else keep whatever the driver gave us
        for wanted in [b"RGB3", b"YUYV"] {
            let desired = Format::new(fmt.width, fmt.height, FourCC::new(wanted));
            fmt = dev.set_format(&desired).unwrap_or(fmt);
            if fmt.fourcc == FourCC::new(wanted) {
                break;
            }
        }

        let format = PixelFormat::from_fourcc(fmt.fourcc);
        log::info!(
            "camera {}: {}x{} {:?}",
            device,
            fmt.width,
            fmt.height,
            format
        );
        let stream = Stream::with_buffers(&dev, Type::VideoCapture, 4).context("stream")?;
        Ok(Self {
            stream,
            width: fmt.width,
            height: fmt.height,
            format,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame(&mut self) -> Result<RgbImage> {
        let (data, meta) = self.stream.next().context("capture frame")?;
        log::trace!("captured frame seq={} len={}", meta.sequence, data.len());
        self.format.to_rgb(self.width, self.height, data)
    }
}

fn yuyv_to_rgb(pixels: usize, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < pixels * 2 {
        anyhow::bail!("short YUYV buffer: {} < {}", data.len(), pixels * 2);
    }
    let mut out = Vec::with_capacity(pixels * 3);
    for chunk in data[..pixels * 2].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0] as f32, chunk[2] as f32] {
            out.push(clamp(y + 1.402 * v));
            out.push(clamp(y - 0.344136 * u - 0.714136 * v));
            out.push(clamp(y + 1.772 * u));
        }
    }
    Ok(out)
}

fn clamp(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_neutral_chroma_is_grey() {
        let data = [100u8, 128, 200, 128];
        let img = PixelFormat::Yuyv.to_rgb(2, 1, &data).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [100, 100, 100]);
        assert_eq!(img.get_pixel(1, 0).0, [200, 200, 200]);
    }

    #[test]
    fn test_grey_expands_channels() {
        let img = PixelFormat::Grey.to_rgb(2, 2, &[1, 2, 3, 4]).unwrap();
        assert_eq!(img.get_pixel(1, 1).0, [4, 4, 4]);
    }

    #[test]
    fn test_short_buffers_are_errors() {
        assert!(PixelFormat::Rgb3.to_rgb(2, 2, &[0; 11]).is_err());
        assert!(PixelFormat::Yuyv.to_rgb(2, 2, &[0; 7]).is_err());
        assert!(PixelFormat::Grey.to_rgb(2, 2, &[0; 3]).is_err());
    }

    #[test]
    fn test_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"YUYV")), PixelFormat::Yuyv);
        let mjpg = FourCC::new(b"MJPG");
        assert_eq!(PixelFormat::from_fourcc(mjpg), PixelFormat::Other(mjpg));
        assert!(PixelFormat::Other(mjpg).to_rgb(1, 1, &[0; 3]).is_err());
    }
}
