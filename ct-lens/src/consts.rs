//! 通用常量.

/// 单通道颜色与分割标签.
pub mod gray {
    /// 分割掩码中背景的像素值.
    pub const SEG_BACKGROUND: u8 = 0;

    /// 分割掩码中异常区域的像素值 (二分类分割网络的前景).
    pub const SEG_ABNORMAL: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, SEG_BACKGROUND)
    }
}

/// 风险评分的默认权重与阈值.
pub mod risk {
    /// 分类网络中 "异常" 类别的索引.
    pub const ABNORMAL_CLASS: usize = 1;

    /// 分类为异常时, 置信度乘以该权重计入风险分.
    pub const CLASSIFICATION_WEIGHT: f64 = 0.7;

    /// 每个超过阈值的异常分割区域固定计入的风险分.
    pub const REGION_WEIGHT: f64 = 0.3;

    /// 异常分割区域的面积占比阈值 (百分比, 严格大于).
    pub const REGION_PERCENT_THRESHOLD: f64 = 5.0;

    /// 高风险下限.
    pub const HIGH_THRESHOLD: f64 = 0.8;

    /// 中风险下限.
    pub const MEDIUM_THRESHOLD: f64 = 0.5;

    /// 低风险下限.
    pub const LOW_THRESHOLD: f64 = 0.2;
}

/// 常见 CT 窗口 (窗位, 窗宽), 单位为 HU.
pub mod window {
    /// 肝脏窗.
    pub const LIVER: (f32, f32) = (60.0, 200.0);

    /// 腹部软组织窗.
    pub const ABDOMEN: (f32, f32) = (40.0, 400.0);

    /// 肺窗.
    pub const LUNG: (f32, f32) = (-600.0, 1500.0);

    /// 骨窗.
    pub const BONE: (f32, f32) = (400.0, 1800.0);

    /// 脑窗.
    pub const BRAIN: (f32, f32) = (40.0, 80.0);
}

/// 预处理默认目标宽度.
pub const DEFAULT_TARGET_WIDTH: u32 = 512;

/// 预处理默认目标高度.
pub const DEFAULT_TARGET_HEIGHT: u32 = 512;

/// 缺失文本元信息时使用的哨兵值.
pub const UNKNOWN: &str = "Unknown";

/// 分类概率和允许的浮点误差.
pub const PROBABILITY_TOLERANCE: f32 = 1e-3;

/// 分类网络默认类别名, 按索引排列.
pub const DEFAULT_CLASS_LABELS: [&str; 2] = ["normal", "abnormal"];
